//! Handler for `trellis resolve`.

use std::collections::BTreeMap;

use miette::Result;

use trellis_resolver::graph::{GraphReport, ResolvedGraph};
use trellis_util::errors::TrellisError;
use trellis_util::status::status;

use crate::session::Session;

pub async fn exec(session: &Session, configuration: Option<&str>, json: bool) -> Result<()> {
    let graphs: BTreeMap<String, ResolvedGraph> = match configuration {
        Some(name) => BTreeMap::from([(name.to_string(), session.resolve(name).await)]),
        None => session.resolver.resolve_all(&session.project).await,
    };

    if json {
        let reports: Vec<GraphReport> = graphs.values().map(ResolvedGraph::report).collect();
        let out = serde_json::to_string_pretty(&reports).map_err(|e| TrellisError::Generic {
            message: format!("Failed to serialize report: {e}"),
        })?;
        println!("{out}");
    } else {
        for graph in graphs.values() {
            print_components(graph);
        }
    }

    super::report_failures(graphs.values())
}

fn print_components(graph: &ResolvedGraph) {
    let components = graph.components();
    status(
        "Resolved",
        &format!(
            "{} ({} components, {} pass{})",
            graph.configuration(),
            components.len().saturating_sub(1),
            graph.iterations(),
            if graph.iterations() == 1 { "" } else { "es" }
        ),
    );
    println!("{}:", graph.configuration());
    for component in components.iter().skip(1) {
        match component.reason {
            Some(ref reason) => println!("  {component} ({reason})"),
            None => println!("  {component}"),
        }
    }
    super::report_conflicts(graph);
}
