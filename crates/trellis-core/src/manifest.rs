use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use trellis_util::errors::TrellisError;

use crate::attributes::{AttributeSet, AttributesSchema};
use crate::component::Artifact;
use crate::configuration::ConfigurationRole;
use crate::dependency::ModuleId;
use crate::notation::{Notation, NotationRegistry};
use crate::project::{Project, ProjectIdentity, ProjectRegistry};

/// Top-level representation of a `Trellis.toml` project manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub project: ProjectMetadata,

    #[serde(default)]
    pub configurations: BTreeMap<String, ConfigurationDecl>,

    #[serde(default)]
    pub schema: AttributesSchema,

    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Sibling projects: project path → manifest file, relative to this one.
    #[serde(default)]
    pub projects: BTreeMap<String, PathBuf>,
}

/// Project metadata from `[project]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub group: String,
    pub version: String,
    #[serde(default = "default_project_path")]
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_project_path() -> String {
    ":".to_string()
}

/// One `[configurations.<name>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationDecl {
    pub role: ConfigurationRole,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "extends-from")]
    pub extends_from: Vec<String>,
    #[serde(default)]
    pub attributes: AttributeSet,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub dependencies: Vec<Notation>,
}

/// How competing version requests are settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Pick the newest version that satisfies every constraint.
    #[default]
    Newest,
    /// Fail whenever different plain versions of a module are requested.
    Fail,
}

/// Resolution settings from `[resolution]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    #[serde(default)]
    pub strategy: ConflictStrategy,
    /// `group:name` → version forced for the whole resolution.
    #[serde(default)]
    pub force: BTreeMap<String, String>,
    #[serde(default = "default_max_iterations", rename = "max-iterations")]
    pub max_iterations: usize,
    #[serde(
        default = "default_max_concurrent_fetches",
        rename = "max-concurrent-fetches"
    )]
    pub max_concurrent_fetches: usize,
    /// Repository fixture consulted for module metadata.
    #[serde(default)]
    pub repository: Option<PathBuf>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            strategy: ConflictStrategy::default(),
            force: BTreeMap::new(),
            max_iterations: default_max_iterations(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            repository: None,
        }
    }
}

fn default_max_iterations() -> usize {
    32
}

fn default_max_concurrent_fetches() -> usize {
    8
}

impl ResolutionConfig {
    /// Parsed `[resolution.force]` entries.
    pub fn forced_modules(&self) -> miette::Result<Vec<(ModuleId, String)>> {
        self.force
            .iter()
            .map(|(module, version)| {
                ModuleId::parse(module)
                    .map(|id| (id, version.clone()))
                    .ok_or_else(|| {
                        TrellisError::Manifest {
                            message: format!("Invalid module '{module}' in [resolution.force]"),
                        }
                        .into()
                    })
            })
            .collect()
    }
}

impl Manifest {
    /// Load and parse a `Trellis.toml` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TrellisError::Manifest {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::from_str(&content)
    }

    /// Parse a `Trellis.toml` from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            TrellisError::Manifest {
                message: format!("Failed to parse Trellis.toml: {e}"),
            }
            .into()
        })
    }

    pub fn identity(&self) -> ProjectIdentity {
        ProjectIdentity::new(
            &self.project.path,
            &self.project.group,
            &self.project.name,
            &self.project.version,
        )
    }

    /// Build the project model: create every configuration, wire
    /// extends-from edges, then coerce and declare dependencies.
    pub fn into_project(&self, notations: &NotationRegistry) -> miette::Result<Project> {
        let mut project = Project::new(self.identity());
        let container = &mut project.configurations;

        for (name, decl) in &self.configurations {
            let conf = if decl.locked {
                container.create_locked(name, decl.role)
            } else {
                container.create(name, decl.role)
            }
            .map_err(configuration_error)?;
            for (attr, value) in decl.attributes.iter() {
                conf.set_attribute(attr, value);
            }
            for artifact in &decl.artifacts {
                conf.add_artifact(artifact.clone());
            }
            if let Some(ref description) = decl.description {
                conf.set_description(description);
            }
        }

        for (name, decl) in &self.configurations {
            for parent in &decl.extends_from {
                container
                    .extends_from(name, parent)
                    .map_err(configuration_error)?;
            }
        }

        for (name, decl) in &self.configurations {
            for notation in &decl.dependencies {
                let dependency = notations.coerce(notation).map_err(|e| TrellisError::Notation {
                    message: format!("in configuration '{name}': {e}"),
                })?;
                container
                    .add_dependency(name, dependency)
                    .map_err(configuration_error)?;
            }
        }

        tracing::debug!(
            "Loaded {} with {} configurations",
            project.identity,
            project.configurations.len()
        );
        Ok(project)
    }

    /// Load every sibling project listed under `[projects]`. Paths are
    /// relative to `dir`, the directory holding this manifest.
    pub fn load_projects(
        &self,
        dir: &Path,
        notations: &NotationRegistry,
    ) -> miette::Result<ProjectRegistry> {
        let mut registry = ProjectRegistry::new();
        for (path, file) in &self.projects {
            let mut manifest = Manifest::from_path(&dir.join(file))?;
            manifest.project.path = path.clone();
            registry.insert(manifest.into_project(notations)?);
        }
        Ok(registry)
    }
}

fn configuration_error(e: crate::configuration::ConfigurationError) -> TrellisError {
    TrellisError::Configuration {
        message: e.to_string(),
    }
}
