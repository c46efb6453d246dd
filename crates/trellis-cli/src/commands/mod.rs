//! Command dispatch and handler modules.

mod lock;
mod resolve;
mod tree;
mod why;

use miette::Result;

use trellis_resolver::graph::ResolvedGraph;
use trellis_util::errors::TrellisError;
use trellis_util::status::{status_error, status_warn};

use crate::cli::{Cli, Command};
use crate::session::Session;

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    let manifest_path = cli.manifest_path.as_deref();
    match cli.command {
        Command::Resolve {
            configuration,
            json,
            no_lock,
        } => {
            let session = Session::load(manifest_path, !no_lock)?;
            resolve::exec(&session, configuration.as_deref(), json).await
        }
        Command::Tree {
            configuration,
            depth,
            inverted,
            conflicts,
        } => {
            let session = Session::load(manifest_path, true)?;
            tree::exec(&session, &configuration, depth, inverted.as_deref(), conflicts).await
        }
        Command::Why {
            component,
            configuration,
        } => {
            let session = Session::load(manifest_path, true)?;
            why::exec(&session, &component, &configuration).await
        }
        Command::Lock => {
            // Fresh resolution: the existing lockfile must not pin itself.
            let session = Session::load(manifest_path, false)?;
            lock::exec(&session, cli.verbose).await
        }
    }
}

/// Print every failure of `graphs` and fail if there were any.
fn report_failures<'a>(graphs: impl IntoIterator<Item = &'a ResolvedGraph>) -> Result<()> {
    let mut failed = Vec::new();
    let mut count = 0;
    for graph in graphs {
        for failure in graph.failures() {
            status_error("error", &failure.explain());
            count += 1;
        }
        if !graph.is_success() {
            failed.push(graph.configuration().to_string());
        }
    }
    if failed.is_empty() {
        return Ok(());
    }
    Err(TrellisError::Resolution {
        message: format!(
            "{count} failure{} while resolving {}",
            if count == 1 { "" } else { "s" },
            failed.join(", ")
        ),
    }
    .into())
}

fn report_conflicts(graph: &ResolvedGraph) {
    for conflict in &graph.conflicts().conflicts {
        status_warn("conflict", &conflict.to_string());
    }
}
