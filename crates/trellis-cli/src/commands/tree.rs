//! Handler for `trellis tree`.

use miette::Result;

use crate::session::Session;

pub async fn exec(
    session: &Session,
    configuration: &str,
    depth: Option<usize>,
    inverted: Option<&str>,
    conflicts: bool,
) -> Result<()> {
    let graph = session.resolve(configuration).await;

    if conflicts {
        println!("{}", graph.conflicts().to_string().trim_end());
    } else if let Some(component) = inverted {
        let output = graph.print_inverted_tree(component);
        if output.is_empty() {
            println!("'{component}' is not part of {configuration}.");
        } else {
            print!("{output}");
        }
    } else {
        print!("{}", graph.print_tree(depth));
    }

    super::report_failures(std::iter::once(&graph))
}
