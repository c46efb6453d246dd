//! Turning one version constraint into candidate versions.

use std::fmt;

use trellis_core::dependency::VersionConstraint;

use crate::version::{Version, VersionSpec};

/// A [`VersionConstraint`] with every version string parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub require: Option<VersionSpec>,
    pub strictly: Option<VersionSpec>,
    pub prefer: Option<Version>,
    pub reject: Vec<VersionSpec>,
    pub force: bool,
}

/// A version string in a constraint that does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedSelector(pub String);

impl fmt::Display for MalformedSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed version selector '{}'", self.0)
    }
}

fn spec(text: &Option<String>) -> Result<Option<VersionSpec>, MalformedSelector> {
    match text {
        Some(t) => VersionSpec::parse(t)
            .map(Some)
            .ok_or_else(|| MalformedSelector(t.clone())),
        None => Ok(None),
    }
}

impl Selector {
    pub fn parse(constraint: &VersionConstraint) -> Result<Self, MalformedSelector> {
        let reject = constraint
            .reject
            .iter()
            .map(|r| VersionSpec::parse(r).ok_or_else(|| MalformedSelector(r.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            require: spec(&constraint.require)?,
            strictly: spec(&constraint.strictly)?,
            prefer: constraint.prefer.as_deref().map(Version::parse),
            reject,
            force: constraint.force,
        })
    }

    /// The forced selector, if this constraint is forced.
    pub fn forced(&self) -> Option<&VersionSpec> {
        if !self.force {
            return None;
        }
        self.require.as_ref().or(self.strictly.as_ref())
    }

    /// Whether candidates can only be found by listing published versions.
    pub fn needs_listing(&self) -> bool {
        let dynamic = |s: &Option<VersionSpec>| s.as_ref().is_some_and(VersionSpec::is_dynamic);
        dynamic(&self.require)
            || dynamic(&self.strictly)
            || (self.require.is_none() && self.strictly.is_none() && self.prefer.is_none())
    }

    pub fn is_rejected(&self, version: &Version) -> bool {
        self.reject.iter().any(|r| r.accepts(version))
    }

    /// Whether `version` satisfies this constraint. A plain required
    /// version accepts anything at least as new.
    pub fn accepts(&self, version: &Version) -> bool {
        let required = match &self.require {
            Some(VersionSpec::Exact(min)) => version >= min,
            Some(other) => other.accepts(version),
            None => true,
        };
        let strict = self.strictly.as_ref().map_or(true, |s| s.accepts(version));
        required && strict && !self.is_rejected(version)
    }

    /// Versions this constraint names on its own: exact versions as
    /// written, listed versions inside ranges, and every listed version when
    /// nothing is constrained.
    pub fn named_versions(&self, listing: &[Version]) -> Vec<Version> {
        let mut named = Vec::new();
        for s in [&self.require, &self.strictly].into_iter().flatten() {
            match s {
                VersionSpec::Exact(v) => named.push(v.clone()),
                dynamic => named.extend(listing.iter().filter(|v| dynamic.accepts(v)).cloned()),
            }
        }
        if let Some(ref prefer) = self.prefer {
            named.push(prefer.clone());
        }
        if self.require.is_none() && self.strictly.is_none() && self.prefer.is_none() {
            named.extend(listing.iter().cloned());
        }
        named
    }
}

/// Candidate versions for a single constraint, newest first.
pub fn resolve_selector(selector: &Selector, listing: &[Version]) -> Vec<Version> {
    let mut candidates: Vec<Version> = selector
        .named_versions(listing)
        .into_iter()
        .filter(|v| selector.accepts(v))
        .collect();
    candidates.sort_by(|a, b| b.cmp(a));
    candidates.dedup();
    candidates
}
