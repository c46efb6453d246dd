//! Resolution failures and where they came from.

use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use trellis_core::attributes::AttributeSet;
use trellis_core::configuration::ConfigurationError;
use trellis_core::dependency::{ModuleId, VersionConstraint};
use trellis_core::notation::NotationError;

/// Where a request entered the graph: the resolving configuration, the
/// configuration or variant that declared it, and the path from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub configuration: String,
    pub declared_in: String,
    pub path: Vec<String>,
    pub dependency: String,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' declared in {}", self.dependency, self.declared_in)?;
        if !self.path.is_empty() {
            write!(f, " via {}", self.path.join(" -> "))?;
        }
        write!(f, " (resolving {})", self.configuration)
    }
}

/// A version constraint as it was requested, with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedConstraint {
    pub constraint: VersionConstraint,
    pub provenance: Provenance,
}

impl fmt::Display for RequestedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.constraint, self.provenance.declared_in)
    }
}

fn list<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything that can go wrong while resolving one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ResolutionFailure {
    #[error("Cannot convert {notation} to a dependency")]
    #[diagnostic(help("Use a coordinate string, module map, file set or project reference"))]
    UnsupportedNotation {
        notation: String,
        accepted: Vec<String>,
    },

    #[error("Configuration '{configuration}' with role {role} cannot {operation}")]
    IllegalRoleOperation {
        configuration: String,
        role: String,
        operation: String,
    },

    #[error("Conflicting forced versions of {module}: {}", list(.forced))]
    #[diagnostic(help("Only one version of a module can be forced"))]
    ForcedVersionConflict {
        module: ModuleId,
        forced: Vec<RequestedConstraint>,
    },

    #[error("Strict version constraints on {module} cannot be satisfied: {}", list(.constraints))]
    StrictVersionConflict {
        module: ModuleId,
        constraints: Vec<RequestedConstraint>,
    },

    #[error("No version of {module} satisfies {}", list(.constraints))]
    NoCompatibleVersion {
        module: ModuleId,
        constraints: Vec<RequestedConstraint>,
        available: Vec<String>,
    },

    #[error("Version conflict on {module}: {}", list(.requested))]
    #[diagnostic(help("The fail strategy rejects different requested versions of one module"))]
    VersionConflict {
        module: ModuleId,
        requested: Vec<RequestedConstraint>,
    },

    #[error("Resolution did not converge after {iterations} iterations")]
    #[diagnostic(help("Raise [resolution] max-iterations or pin the oscillating module"))]
    ResolutionDidNotConverge { iterations: usize },

    #[error("No variant of {component} is compatible with {requested}; candidates: {}", .candidates.join(", "))]
    NoCompatibleVariant {
        component: String,
        requested: AttributeSet,
        candidates: Vec<String>,
    },

    #[error("Cannot choose between variants of {component} for {requested}: {}", .candidates.join(", "))]
    #[diagnostic(help("Request a more specific attribute or declare a preference in [schema]"))]
    AmbiguousVariant {
        component: String,
        requested: AttributeSet,
        candidates: Vec<String>,
    },

    #[error("{component} is requested with conflicting values for '{attribute}': {}", .values.join(", "))]
    ConflictingAttributeRequest {
        component: String,
        attribute: String,
        values: Vec<String>,
    },

    #[error("Dependency cycle: {}", .path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("Could not resolve {selector}: {reason}")]
    SelectorUnresolvable { selector: String, reason: String },

    #[error("Resolution was cancelled")]
    Cancelled,
}

impl ResolutionFailure {
    /// Stable name of the failure kind, used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionFailure::UnsupportedNotation { .. } => "unsupported-notation",
            ResolutionFailure::IllegalRoleOperation { .. } => "illegal-role-operation",
            ResolutionFailure::ForcedVersionConflict { .. } => "forced-version-conflict",
            ResolutionFailure::StrictVersionConflict { .. } => "strict-version-conflict",
            ResolutionFailure::NoCompatibleVersion { .. } => "no-compatible-version",
            ResolutionFailure::VersionConflict { .. } => "version-conflict",
            ResolutionFailure::ResolutionDidNotConverge { .. } => "did-not-converge",
            ResolutionFailure::NoCompatibleVariant { .. } => "no-compatible-variant",
            ResolutionFailure::AmbiguousVariant { .. } => "ambiguous-variant",
            ResolutionFailure::ConflictingAttributeRequest { .. } => "conflicting-attribute-request",
            ResolutionFailure::DependencyCycle { .. } => "dependency-cycle",
            ResolutionFailure::SelectorUnresolvable { .. } => "selector-unresolvable",
            ResolutionFailure::Cancelled => "cancelled",
        }
    }

    /// Constraints that took part in a version failure.
    pub fn constraints(&self) -> &[RequestedConstraint] {
        match self {
            ResolutionFailure::ForcedVersionConflict { forced: c, .. }
            | ResolutionFailure::StrictVersionConflict { constraints: c, .. }
            | ResolutionFailure::NoCompatibleVersion { constraints: c, .. }
            | ResolutionFailure::VersionConflict { requested: c, .. } => c,
            _ => &[],
        }
    }
}

impl From<NotationError> for ResolutionFailure {
    fn from(e: NotationError) -> Self {
        match e {
            NotationError::UnsupportedNotation { notation, accepted } => {
                ResolutionFailure::UnsupportedNotation { notation, accepted }
            }
            NotationError::InvalidNotation { notation, message } => {
                ResolutionFailure::UnsupportedNotation {
                    notation: format!("{notation} ({message})"),
                    accepted: Vec::new(),
                }
            }
        }
    }
}

impl ResolutionFailure {
    /// A configuration that could not be used, with `subject` naming the
    /// project and configuration involved.
    pub fn configuration(e: ConfigurationError, subject: impl Into<String>) -> Self {
        match e {
            ConfigurationError::IllegalRoleOperation {
                configuration,
                role,
                operation,
            } => ResolutionFailure::IllegalRoleOperation {
                configuration,
                role: role.to_string(),
                operation,
            },
            other => ResolutionFailure::SelectorUnresolvable {
                selector: subject.into(),
                reason: other.to_string(),
            },
        }
    }
}

/// A failure recorded in a resolved graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub failure: ResolutionFailure,
    /// Absent for failures of the whole resolution (cancellation,
    /// non-convergence).
    pub provenance: Option<Provenance>,
}

impl Failure {
    pub fn new(failure: ResolutionFailure, provenance: Option<Provenance>) -> Self {
        Self {
            failure,
            provenance,
        }
    }

    /// Multi-line explanation: the failure, where it was requested, and
    /// every constraint that took part.
    pub fn explain(&self) -> String {
        let mut out = self.failure.to_string();
        if let Some(ref provenance) = self.provenance {
            out.push_str(&format!("\n  requested as {provenance}"));
        }
        for c in self.failure.constraints() {
            out.push_str(&format!("\n  - {} ({})", c.constraint, c.provenance));
        }
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provenance(declared_in: &str) -> Provenance {
        Provenance {
            configuration: "runtimeClasspath".to_string(),
            declared_in: declared_in.to_string(),
            path: vec![":app".to_string(), "org.example:b".to_string()],
            dependency: "org.example:a:2.0".to_string(),
        }
    }

    #[test]
    fn cycle_message_shows_path() {
        let failure = ResolutionFailure::DependencyCycle {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(failure.to_string(), "Dependency cycle: A -> B -> A");
    }

    #[test]
    fn explain_lists_constraints() {
        let failure = ResolutionFailure::NoCompatibleVersion {
            module: ModuleId::new("org.example", "a"),
            constraints: vec![
                RequestedConstraint {
                    constraint: VersionConstraint::strictly("1.0"),
                    provenance: provenance("implementation"),
                },
                RequestedConstraint {
                    constraint: VersionConstraint::require("2.0"),
                    provenance: provenance("org.example:b:1.0"),
                },
            ],
            available: vec!["1.0".into(), "2.0".into()],
        };
        let explained = Failure::new(failure, Some(provenance("implementation"))).explain();
        assert!(explained.starts_with("No version of org.example:a satisfies"));
        assert!(explained.contains("strictly 1.0 ('org.example:a:2.0' declared in implementation via :app -> org.example:b"));
        assert!(explained.contains("- 2.0 ("));
    }

    #[test]
    fn notation_errors_convert() {
        let failure: ResolutionFailure = NotationError::UnsupportedNotation {
            notation: "integer 42".into(),
            accepted: vec!["x".into()],
        }
        .into();
        assert_eq!(failure.kind(), "unsupported-notation");
    }

    #[test]
    fn configuration_errors_name_their_subject() {
        let failure = ResolutionFailure::configuration(
            ConfigurationError::Unknown("nope".into()),
            "configuration nope of project :lib",
        );
        assert_eq!(failure.kind(), "selector-unresolvable");
        assert_eq!(
            failure.to_string(),
            "Could not resolve configuration nope of project :lib: Configuration 'nope' not found"
        );
    }
}
