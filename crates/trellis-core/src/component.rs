//! Component metadata: the variants a component version offers.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::attributes::AttributeSet;
use crate::dependency::{Dependency, ModuleId};

/// A file-path-like handle to an artifact. Fetching the file is left to
/// the artifact-fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact {
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File name of the artifact.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One interchangeable artifact set of a component, distinguished by its
/// attributes. Variants of a component are mutually exclusive choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default)]
    pub attributes: AttributeSet,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Capabilities provided, as `group:name:version`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    /// Transitive dependencies that come with this variant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

impl Variant {
    pub fn new(name: impl Into<String>, attributes: AttributeSet) -> Self {
        Self {
            name: name.into(),
            attributes,
            artifacts: Vec::new(),
            capabilities: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }
}

/// Everything the metadata collaborator knows about one module version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub module: ModuleId,
    pub version: String,
    pub variants: Vec<Variant>,
}

impl ComponentMetadata {
    pub fn new(module: ModuleId, version: impl Into<String>) -> Self {
        Self {
            module,
            version: version.into(),
            variants: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }
}
