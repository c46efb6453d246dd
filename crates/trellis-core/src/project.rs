//! Projects: an identity plus the configurations they own.
//!
//! Other projects' consumable configurations are what a project dependency
//! resolves against, so a [`Project`] can present them as component variants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::attributes::AttributeSet;
use crate::component::Variant;
use crate::configuration::{
    Configuration, ConfigurationContainer, ConfigurationError, DeclaredDependency, Usage,
};

/// How a project is addressed (`:app`, `:lib:core`) and what it publishes as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectIdentity {
    pub path: String,
    pub group: String,
    pub name: String,
    pub version: String,
}

impl ProjectIdentity {
    pub fn new(
        path: impl Into<String>,
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Capability every variant of this project provides.
    pub fn capability(&self) -> String {
        format!("{}:{}:{}", self.group, self.name, self.version)
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project {}", self.path)
    }
}

/// Immutable snapshot of what one resolvable configuration asks for.
///
/// Taken when resolution starts; later changes to the container do not
/// affect a resolution already holding the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub project: ProjectIdentity,
    pub configuration: String,
    pub attributes: AttributeSet,
    pub dependencies: Vec<DeclaredDependency>,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub identity: ProjectIdentity,
    pub configurations: ConfigurationContainer,
}

impl Project {
    pub fn new(identity: ProjectIdentity) -> Self {
        Self {
            identity,
            configurations: ConfigurationContainer::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.identity.path
    }

    /// Snapshot the extension closure of a resolvable configuration.
    pub fn resolution_request(&self, name: &str) -> Result<ResolutionRequest, ConfigurationError> {
        self.configurations.check_usage(name, Usage::Resolve)?;
        let attributes = self
            .configurations
            .get(name)
            .map(|c| c.attributes().clone())
            .unwrap_or_default();
        Ok(ResolutionRequest {
            project: self.identity.clone(),
            configuration: name.to_string(),
            attributes,
            dependencies: self.configurations.all_dependencies(name)?,
        })
    }

    /// Names of every configuration that can be resolved, in creation order.
    pub fn resolvable_configurations(&self) -> Vec<String> {
        self.configurations
            .iter()
            .filter(|c| c.role().can_resolve())
            .map(|c| c.name().to_string())
            .collect()
    }

    /// The named configuration presented as a variant. Fails unless the
    /// configuration may be consumed.
    pub fn variant(&self, name: &str) -> Result<Variant, ConfigurationError> {
        self.configurations.check_usage(name, Usage::Consume)?;
        let conf = self
            .configurations
            .get(name)
            .ok_or_else(|| ConfigurationError::Unknown(name.to_string()))?;
        self.as_variant(conf)
    }

    /// Every consumable configuration as a variant.
    pub fn variants(&self) -> Result<Vec<Variant>, ConfigurationError> {
        self.configurations
            .iter()
            .filter(|c| c.role().can_consume())
            .map(|c| {
                self.configurations.check_usage(c.name(), Usage::Consume)?;
                self.as_variant(c)
            })
            .collect()
    }

    fn as_variant(&self, conf: &Configuration) -> Result<Variant, ConfigurationError> {
        let mut variant = Variant::new(conf.name(), conf.attributes().clone());
        variant.artifacts = conf.artifacts().to_vec();
        variant.capabilities = vec![self.identity.capability()];
        variant.dependencies = self
            .configurations
            .all_dependencies(conf.name())?
            .into_iter()
            .map(|d| d.dependency)
            .collect();
        Ok(variant)
    }
}

/// All projects of a build, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, Project>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, project: Project) {
        self.projects.insert(project.path().to_string(), project);
    }

    pub fn get(&self, path: &str) -> Option<&Project> {
        self.projects.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
