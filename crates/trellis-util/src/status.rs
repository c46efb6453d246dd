//! Cargo-style status lines on stderr.

use std::io::Write;

use console::Style;

fn line(style: Style, label: &str, message: &str) {
    let _ = writeln!(std::io::stderr(), "{:>12} {message}", style.apply_to(label));
}

/// `    Resolved runtimeClasspath (4 components)` with a bold green label.
pub fn status(label: &str, message: &str) {
    line(Style::new().green().bold(), label, message);
}

/// Like [`status`] but bold cyan, for informational lines.
pub fn status_info(label: &str, message: &str) {
    line(Style::new().cyan().bold(), label, message);
}

pub fn status_warn(label: &str, message: &str) {
    line(Style::new().yellow().bold(), label, message);
}

/// A failure line. `message` may span several lines; continuation lines
/// are indented under the label.
pub fn status_error(label: &str, message: &str) {
    let indented = message.replace('\n', &format!("\n{:>12} ", ""));
    line(Style::new().red().bold(), label, &indented);
}
