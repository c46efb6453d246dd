use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use trellis_util::errors::TrellisError;

/// Global user configuration loaded from `~/.trellis/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub resolution: GlobalResolutionConfig,
}

/// Resolution settings from `[resolution]` in global config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalResolutionConfig {
    /// Configurations resolved at the same time.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Overrides the manifest's `max-concurrent-fetches` when set.
    #[serde(default, rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: Option<usize>,
}

impl Default for GlobalResolutionConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            max_concurrent_fetches: None,
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl GlobalConfig {
    /// Load the global configuration from `~/.trellis/config.toml`, or return defaults if the file doesn't exist.
    pub fn load() -> miette::Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from an explicit path, defaulting when the file is absent.
    pub fn load_from(path: &Path) -> miette::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| TrellisError::Generic {
            message: format!("Failed to read global config: {e}"),
        })?;
        toml::from_str(&content).map_err(|e| {
            TrellisError::Generic {
                message: format!("Failed to parse global config: {e}"),
            }
            .into()
        })
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// Returns the path to the Trellis data directory (`~/.trellis/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".trellis")
}
