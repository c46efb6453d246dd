//! Handler for `trellis why`.

use miette::Result;

use trellis_util::status::status_error;

use crate::session::Session;

pub async fn exec(session: &Session, component: &str, configuration: &str) -> Result<()> {
    let graph = session.resolve(configuration).await;

    let Some(path) = graph.find_path(component) else {
        // A component that failed to resolve is explained by its failure.
        let related: Vec<_> = graph
            .failures()
            .iter()
            .filter(|f| f.failure.to_string().contains(component))
            .collect();
        if related.is_empty() {
            println!("'{component}' is not part of {configuration}.");
        }
        for failure in related {
            status_error("error", &failure.explain());
        }
        return Ok(());
    };

    println!("Path to {component} in {configuration}:");
    for (i, node) in path.iter().enumerate() {
        let indent = "  ".repeat(i);
        match node.reason {
            Some(ref reason) => println!("{indent}{node} ({reason})"),
            None => println!("{indent}{node}"),
        }
    }

    if let Some(idx) = graph.find_key(component) {
        let requests: Vec<_> = graph
            .dependencies()
            .iter()
            .filter(|e| e.to() == Some(idx))
            .collect();
        if !requests.is_empty() {
            println!("Requested by:");
            for edge in requests {
                println!("  {} ({})", edge.requested, edge.provenance.declared_in);
            }
        }
    }
    Ok(())
}
