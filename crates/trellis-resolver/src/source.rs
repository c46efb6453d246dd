//! The metadata collaborator: where published versions and component
//! metadata come from.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use trellis_core::attributes::AttributeSet;
use trellis_core::component::{Artifact, ComponentMetadata, Variant};
use trellis_core::dependency::ModuleId;
use trellis_core::notation::{Notation, NotationRegistry};
use trellis_util::errors::TrellisError;

use crate::failure::ResolutionFailure;
use crate::version::Version;

/// Errors reported by a [`MetadataSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("request for {0} timed out")]
    Timeout(String),

    /// Previously returned data for this module is out of date. Cached
    /// entries must be dropped before asking again.
    #[error("metadata for {0} is stale")]
    Stale(String),

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Transient errors are never cached.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Timeout(_) | SourceError::Stale(_))
    }
}

/// Supplies published versions and per-version component metadata.
///
/// Calls are blocking; the resolver runs them on the blocking pool.
pub trait MetadataSource: Send + Sync {
    /// Every published version of `module`, in any order.
    fn list_versions(&self, module: &ModuleId) -> Result<Vec<String>, SourceError>;

    fn fetch_metadata(
        &self,
        module: &ModuleId,
        version: &str,
    ) -> Result<ComponentMetadata, SourceError>;
}

impl<T: MetadataSource + ?Sized> MetadataSource for Arc<T> {
    fn list_versions(&self, module: &ModuleId) -> Result<Vec<String>, SourceError> {
        (**self).list_versions(module)
    }

    fn fetch_metadata(
        &self,
        module: &ModuleId,
        version: &str,
    ) -> Result<ComponentMetadata, SourceError> {
        (**self).fetch_metadata(module, version)
    }
}

/// An in-memory repository, usually loaded from a TOML file:
///
/// ```toml
/// [[component]]
/// module = "org.example:lib"
/// version = "1.0"
///
/// [[component.variant]]
/// name = "runtime"
/// attributes = { usage = "runtime" }
/// artifacts = ["lib-1.0.jar"]
/// dependencies = ["org.example:util:[1.0,2.0)"]
/// ```
#[derive(Debug, Clone, Default)]
pub struct RepositoryFixture {
    components: BTreeMap<ModuleId, Vec<ComponentMetadata>>,
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    component: Vec<FixtureComponent>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureComponent {
    module: String,
    version: String,
    #[serde(default)]
    variant: Vec<FixtureVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureVariant {
    name: String,
    #[serde(default)]
    attributes: AttributeSet,
    #[serde(default)]
    artifacts: Vec<PathBuf>,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    dependencies: Vec<Notation>,
}

impl RepositoryFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) one component version.
    pub fn add(&mut self, metadata: ComponentMetadata) {
        let versions = self.components.entry(metadata.module.clone()).or_default();
        versions.retain(|m| Version::parse(&m.version) != Version::parse(&metadata.version));
        versions.push(metadata);
    }

    pub fn with(mut self, metadata: ComponentMetadata) -> Self {
        self.add(metadata);
        self
    }

    pub fn from_path(path: &Path, notations: &NotationRegistry) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TrellisError::Generic {
            message: format!("Failed to read repository {}: {e}", path.display()),
        })?;
        Self::from_str(&content, notations)
    }

    /// Parse a fixture. Variant dependencies go through the same notation
    /// coercion as manifest dependencies.
    pub fn from_str(content: &str, notations: &NotationRegistry) -> miette::Result<Self> {
        let file: FixtureFile = toml::from_str(content).map_err(|e| TrellisError::Generic {
            message: format!("Failed to parse repository: {e}"),
        })?;

        let mut fixture = Self::new();
        for component in file.component {
            let module =
                ModuleId::parse(&component.module).ok_or_else(|| TrellisError::Generic {
                    message: format!("Invalid module '{}' in repository", component.module),
                })?;
            let mut metadata = ComponentMetadata::new(module, &component.version);
            for v in component.variant {
                let mut variant = Variant::new(v.name, v.attributes);
                variant.artifacts = v.artifacts.into_iter().map(Artifact::new).collect();
                variant.capabilities = v.capabilities;
                for notation in &v.dependencies {
                    let dependency = notations.coerce(notation).map_err(ResolutionFailure::from)?;
                    variant.dependencies.push(dependency);
                }
                metadata.variants.push(variant);
            }
            fixture.add(metadata);
        }
        Ok(fixture)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleId> {
        self.components.keys()
    }
}

impl MetadataSource for RepositoryFixture {
    fn list_versions(&self, module: &ModuleId) -> Result<Vec<String>, SourceError> {
        let versions = self
            .components
            .get(module)
            .ok_or_else(|| SourceError::NotFound(module.to_string()))?;
        let mut listed: Vec<Version> = versions.iter().map(|m| Version::parse(&m.version)).collect();
        listed.sort();
        Ok(listed.into_iter().map(|v| v.to_string()).collect())
    }

    fn fetch_metadata(
        &self,
        module: &ModuleId,
        version: &str,
    ) -> Result<ComponentMetadata, SourceError> {
        let wanted = Version::parse(version);
        self.components
            .get(module)
            .and_then(|versions| {
                versions
                    .iter()
                    .find(|m| Version::parse(&m.version) == wanted)
            })
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("{module}:{version}")))
    }
}
