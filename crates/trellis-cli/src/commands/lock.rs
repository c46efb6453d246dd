//! Handler for `trellis lock`.

use miette::Result;

use trellis_core::lockfile::Lockfile;
use trellis_util::errors::TrellisError;
use trellis_util::fs::write_file;
use trellis_util::status::status;

use crate::session::Session;

/// Resolve every resolvable configuration and regenerate `Trellis.lock`.
/// Nothing is written when any configuration fails.
pub async fn exec(session: &Session, verbose: bool) -> Result<()> {
    let graphs = session.resolver.resolve_all(&session.project).await;
    if verbose {
        for graph in graphs.values() {
            super::report_conflicts(graph);
        }
    }
    super::report_failures(graphs.values())?;

    let mut lockfile = Lockfile::default();
    for graph in graphs.values() {
        lockfile.set_configuration(graph.to_lockfile());
    }
    let content = lockfile.to_string_pretty().map_err(|e| TrellisError::Generic {
        message: format!("Failed to serialize lockfile: {e}"),
    })?;
    let path = session.lockfile_path();
    write_file(&path, &content)?;

    let packages: usize = lockfile.configuration.iter().map(|c| c.package.len()).sum();
    status(
        "Locked",
        &format!(
            "{} configurations ({packages} packages) in {}",
            lockfile.configuration.len(),
            path.display()
        ),
    );
    Ok(())
}
