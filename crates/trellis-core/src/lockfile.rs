use serde::{Deserialize, Serialize};
use std::path::Path;

use trellis_util::errors::TrellisError;

use crate::dependency::ModuleId;

/// Deterministic lockfile recording the versions each resolvable
/// configuration resolved to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub configuration: Vec<LockedConfiguration>,
}

/// The locked result of one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedConfiguration {
    pub name: String,
    #[serde(default)]
    pub package: Vec<LockedPackage>,
}

/// A single locked module with the variant that was selected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub group: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl LockedPackage {
    pub fn module(&self) -> ModuleId {
        ModuleId::new(&self.group, &self.name)
    }
}

impl Lockfile {
    /// Load and parse a `Trellis.lock` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TrellisError::Generic {
            message: format!("Failed to read lockfile: {e}"),
        })?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            TrellisError::Generic {
                message: format!("Failed to parse lockfile: {e}"),
            }
            .into()
        })
    }

    /// Serialize the lockfile to a pretty-printed TOML string.
    pub fn to_string_pretty(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn configuration(&self, name: &str) -> Option<&LockedConfiguration> {
        self.configuration.iter().find(|c| c.name == name)
    }

    /// Replace (or add) the locked state of one configuration, keeping the
    /// others. Configurations stay sorted by name.
    pub fn set_configuration(&mut self, locked: LockedConfiguration) {
        self.configuration.retain(|c| c.name != locked.name);
        self.configuration.push(locked);
        self.configuration.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Locked module versions for a configuration. Empty when the
    /// configuration was never locked.
    pub fn locked_versions(&self, configuration: &str) -> Vec<(ModuleId, String)> {
        self.configuration(configuration)
            .map(|c| {
                c.package
                    .iter()
                    .map(|p| (p.module(), p.version.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
