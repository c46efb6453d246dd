//! Choosing one version per module from every constraint placed on it,
//! and reporting the modules that were requested at several versions.

use std::fmt;

use trellis_core::dependency::ModuleId;
use trellis_core::manifest::ConflictStrategy;

use crate::failure::{RequestedConstraint, ResolutionFailure};
use crate::selector::{resolve_selector, Selector};
use crate::version::{Version, VersionSpec};

/// Why a version won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    /// The only version asked for.
    Requested,
    Forced,
    /// Pinned by a strict constraint.
    Strict,
    /// A preferred version, with nothing stronger in the way.
    Preferred,
    /// Newest listed version matching a dynamic selector.
    Dynamic,
    /// Newest of several requested versions.
    ConflictResolution,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectionReason::Requested => "requested",
            SelectionReason::Forced => "forced",
            SelectionReason::Strict => "strict constraint",
            SelectionReason::Preferred => "preferred",
            SelectionReason::Dynamic => "newest matching",
            SelectionReason::ConflictResolution => "conflict resolution: newest wins",
        })
    }
}

/// The outcome of conflict resolution for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub version: String,
    pub reason: SelectionReason,
    /// Distinct constraints that were placed on the module.
    pub requested: Vec<String>,
}

/// Whether any constraint needs the published version list.
pub fn needs_listing(constraints: &[RequestedConstraint]) -> bool {
    constraints
        .iter()
        .filter_map(|c| Selector::parse(&c.constraint).ok())
        .any(|s| s.needs_listing())
}

fn distinct_by<T: PartialEq + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Settle every constraint placed on `module` into one version.
///
/// `listing` holds the published versions; it may be empty when no
/// constraint is dynamic.
pub fn resolve_conflicts(
    module: &ModuleId,
    constraints: &[RequestedConstraint],
    listing: &[String],
    strategy: ConflictStrategy,
) -> Result<Selection, ResolutionFailure> {
    let selectors = constraints
        .iter()
        .map(|c| {
            Selector::parse(&c.constraint).map_err(|e| ResolutionFailure::SelectorUnresolvable {
                selector: format!("{module}:{}", c.constraint),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let listing: Vec<Version> = listing.iter().map(|v| Version::parse(v)).collect();
    let requested = distinct_by(constraints.iter().map(|c| c.constraint.to_string()));

    let pick = |indices: &[usize]| -> Vec<RequestedConstraint> {
        indices.iter().map(|&i| constraints[i].clone()).collect()
    };
    let strict: Vec<usize> = (0..selectors.len())
        .filter(|&i| selectors[i].strictly.is_some())
        .collect();
    let satisfies_strict = |v: &Version| {
        strict.iter().all(|&i| {
            selectors[i]
                .strictly
                .as_ref()
                .is_some_and(|s| s.accepts(v))
        })
    };

    let forced: Vec<usize> = (0..selectors.len())
        .filter(|&i| selectors[i].forced().is_some())
        .collect();
    if !forced.is_empty() {
        let specs = distinct_by(forced.iter().filter_map(|&i| selectors[i].forced().cloned()));
        if specs.len() > 1 {
            return Err(ResolutionFailure::ForcedVersionConflict {
                module: module.clone(),
                forced: pick(&forced),
            });
        }
        let version = match &specs[0] {
            VersionSpec::Exact(v) => Some(v.clone()),
            dynamic => listing.iter().filter(|v| dynamic.accepts(v)).max().cloned(),
        };
        let Some(version) = version else {
            return Err(ResolutionFailure::NoCompatibleVersion {
                module: module.clone(),
                constraints: pick(&forced),
                available: listing.iter().map(|v| v.to_string()).collect(),
            });
        };
        if !satisfies_strict(&version) {
            let involved: Vec<usize> = distinct_by(forced.iter().chain(&strict).copied());
            return Err(ResolutionFailure::StrictVersionConflict {
                module: module.clone(),
                constraints: pick(&involved),
            });
        }
        return Ok(Selection {
            version: version.to_string(),
            reason: SelectionReason::Forced,
            requested,
        });
    }

    // Each constraint contributes the candidates it accepts on its own.
    let mut pool: Vec<Version> = selectors
        .iter()
        .flat_map(|s| resolve_selector(s, &listing))
        .collect();
    pool.sort_by(|a, b| b.cmp(a));
    pool.dedup();

    if !strict.is_empty() && !pool.iter().any(|v| satisfies_strict(v)) {
        return Err(ResolutionFailure::StrictVersionConflict {
            module: module.clone(),
            constraints: pick(&strict),
        });
    }

    let plain: Vec<usize> = (0..selectors.len())
        .filter(|&i| matches!(selectors[i].require, Some(VersionSpec::Exact(_))))
        .collect();
    if strategy == ConflictStrategy::Fail {
        let versions = distinct_by(plain.iter().filter_map(|&i| selectors[i].require.clone()));
        if versions.len() > 1 {
            return Err(ResolutionFailure::VersionConflict {
                module: module.clone(),
                requested: pick(&plain),
            });
        }
    }

    let survivors: Vec<Version> = pool
        .into_iter()
        .filter(|v| selectors.iter().all(|s| s.accepts(v)))
        .collect();
    let Some(newest) = survivors.first() else {
        return Err(ResolutionFailure::NoCompatibleVersion {
            module: module.clone(),
            constraints: constraints.to_vec(),
            available: listing.iter().map(|v| v.to_string()).collect(),
        });
    };

    if selectors.iter().all(|s| s.require.is_none()) {
        let preferred = selectors
            .iter()
            .filter_map(|s| s.prefer.as_ref())
            .filter(|p| survivors.contains(p))
            .max();
        if let Some(p) = preferred {
            return Ok(Selection {
                version: p.to_string(),
                reason: SelectionReason::Preferred,
                requested,
            });
        }
    }

    let distinct_plain = distinct_by(plain.iter().filter_map(|&i| selectors[i].require.clone()));
    let reason = if distinct_plain.len() > 1 {
        SelectionReason::ConflictResolution
    } else if !strict.is_empty() {
        SelectionReason::Strict
    } else if selectors.iter().any(|s| s.needs_listing()) {
        SelectionReason::Dynamic
    } else {
        SelectionReason::Requested
    };
    Ok(Selection {
        version: newest.to_string(),
        reason,
        requested,
    })
}

/// A report of every module requested at more than one version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// One module that was requested with different constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub module: ModuleId,
    pub requested: Vec<String>,
    pub selected: String,
    pub reason: String,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    /// Record `selection` if more than one constraint took part.
    pub fn record(&mut self, module: &ModuleId, selection: &Selection) {
        if selection.requested.len() > 1 {
            self.add(VersionConflict {
                module: module.clone(),
                requested: selection.requested.clone(),
                selected: selection.version.clone(),
                reason: selection.reason.to_string(),
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(f, "  {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requested {} -> {} ({})",
            self.module,
            self.requested.join(", "),
            self.selected,
            self.reason
        )
    }
}
