use std::path::{Path, PathBuf};

use crate::errors::TrellisError;

/// Project manifest file name.
pub const MANIFEST_FILE: &str = "Trellis.toml";

/// Lockfile written next to the manifest.
pub const LOCKFILE: &str = "Trellis.lock";

/// Walk up from `start` looking for a file named `filename`.
/// Returns the directory containing the file, or `None`.
pub fn find_ancestor_with(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(filename).is_file() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

/// Locate the `Trellis.toml` governing `start`.
pub fn find_manifest(start: &Path) -> Result<PathBuf, TrellisError> {
    find_ancestor_with(start, MANIFEST_FILE)
        .map(|dir| dir.join(MANIFEST_FILE))
        .ok_or_else(|| TrellisError::Manifest {
            message: format!("Could not find {MANIFEST_FILE} in this directory or any parent"),
        })
}

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) -> Result<(), TrellisError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    Ok(())
}
