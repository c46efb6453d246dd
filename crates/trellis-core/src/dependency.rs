use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::attributes::AttributeSet;

/// A logical dependency identity: `group:name`, independent of version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId {
    pub group: String,
    pub name: String,
}

impl ModuleId {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Parse `"group:name"`. Both parts must be non-empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (group, name) = s.split_once(':')?;
        if group.is_empty() || name.is_empty() || name.contains(':') {
            return None;
        }
        Some(Self::new(group, name))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// Version requirements attached to a module dependency.
///
/// Version strings are kept verbatim here; ordering and range semantics
/// belong to the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionConstraint {
    /// Required version or range. A plain version accepts any newer version
    /// chosen by conflict resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require: Option<String>,
    /// Version or range that may not be widened by conflict resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strictly: Option<String>,
    /// Default used only when nothing stronger is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer: Option<String>,
    /// Versions (or ranges) that must never be selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reject: Vec<String>,
    /// The required (or strict) version wins over every other request.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
}

impl VersionConstraint {
    pub fn require(version: impl Into<String>) -> Self {
        Self {
            require: Some(version.into()),
            ..Self::default()
        }
    }

    pub fn strictly(version: impl Into<String>) -> Self {
        Self {
            strictly: Some(version.into()),
            ..Self::default()
        }
    }

    pub fn prefer(version: impl Into<String>) -> Self {
        Self {
            prefer: Some(version.into()),
            ..Self::default()
        }
    }

    pub fn forced(version: impl Into<String>) -> Self {
        Self {
            require: Some(version.into()),
            force: true,
            ..Self::default()
        }
    }

    pub fn rejecting<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reject.extend(versions.into_iter().map(Into::into));
        self
    }

    /// Parse the version part of a coordinate string.
    ///
    /// `1.5` is a requirement, `1.5!!` is strict, and `[1.0,2.0)!!1.5` is a
    /// strict range with a preferred version. An empty string means no
    /// constraint.
    pub fn parse(version: &str) -> Self {
        let version = version.trim();
        match version.split_once("!!") {
            Some((strict, prefer)) => Self {
                strictly: Some(strict.trim().to_string()).filter(|s| !s.is_empty()),
                prefer: Some(prefer.trim().to_string()).filter(|s| !s.is_empty()),
                ..Self::default()
            },
            None if version.is_empty() => Self::default(),
            None => Self::require(version),
        }
    }

    /// The version a forced constraint pins, if any.
    pub fn forced_version(&self) -> Option<&str> {
        if !self.force {
            return None;
        }
        self.require.as_deref().or(self.strictly.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.require.is_none()
            && self.strictly.is_none()
            && self.prefer.is_none()
            && self.reject.is_empty()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(ref require) = self.require {
            parts.push(require.clone());
        }
        if let Some(ref strictly) = self.strictly {
            parts.push(format!("strictly {strictly}"));
        }
        if let Some(ref prefer) = self.prefer {
            parts.push(format!("prefer {prefer}"));
        }
        if !self.reject.is_empty() {
            parts.push(format!("reject {}", self.reject.join(", ")));
        }
        if self.force {
            parts.push("(forced)".to_string());
        }
        if parts.is_empty() {
            return f.write_str("any");
        }
        f.write_str(&parts.join(" "))
    }
}

/// A literal collection of files. Dependencies on a file set resolve to the
/// files themselves without consulting any repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileSet {
    pub files: Vec<PathBuf>,
}

impl FileSet {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for FileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .files
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        write!(f, "files({})", names.join(", "))
    }
}

/// What a dependency points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyTarget {
    /// A published module, selected by version constraint.
    Module {
        module: ModuleId,
        constraint: VersionConstraint,
    },
    /// Another project's output. Without an explicit configuration the
    /// consumable configurations of that project are matched by attributes.
    Project {
        path: String,
        configuration: Option<String>,
    },
    /// A literal file set.
    Files(FileSet),
}

/// A uniform, immutable dependency produced by notation coercion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub target: DependencyTarget,
    /// Attributes requested on top of the consuming configuration's.
    #[serde(default, skip_serializing_if = "AttributeSet::is_empty")]
    pub attributes: AttributeSet,
    /// Human explanation recorded for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Dependency {
    pub fn module(module: ModuleId, constraint: VersionConstraint) -> Self {
        Self::new(DependencyTarget::Module { module, constraint })
    }

    pub fn project(path: impl Into<String>) -> Self {
        Self::new(DependencyTarget::Project {
            path: path.into(),
            configuration: None,
        })
    }

    pub fn project_configuration(path: impl Into<String>, configuration: impl Into<String>) -> Self {
        Self::new(DependencyTarget::Project {
            path: path.into(),
            configuration: Some(configuration.into()),
        })
    }

    pub fn files(files: FileSet) -> Self {
        Self::new(DependencyTarget::Files(files))
    }

    fn new(target: DependencyTarget) -> Self {
        Self {
            target,
            attributes: AttributeSet::new(),
            reason: None,
        }
    }

    pub fn with_attributes(mut self, attributes: AttributeSet) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// File-set dependencies resolve to themselves: no version selection,
    /// no conflict resolution, no variant matching.
    pub fn is_self_resolving(&self) -> bool {
        matches!(self.target, DependencyTarget::Files(_))
    }

    pub fn module_id(&self) -> Option<&ModuleId> {
        match &self.target {
            DependencyTarget::Module { module, .. } => Some(module),
            _ => None,
        }
    }

    pub fn constraint(&self) -> Option<&VersionConstraint> {
        match &self.target {
            DependencyTarget::Module { constraint, .. } => Some(constraint),
            _ => None,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            DependencyTarget::Module { module, constraint } if constraint.is_empty() => {
                write!(f, "{module}")
            }
            DependencyTarget::Module { module, constraint } => write!(f, "{module}:{constraint}"),
            DependencyTarget::Project {
                path,
                configuration: Some(conf),
            } => write!(f, "project {path} ({conf})"),
            DependencyTarget::Project { path, .. } => write!(f, "project {path}"),
            DependencyTarget::Files(files) => write!(f, "{files}"),
        }
    }
}
