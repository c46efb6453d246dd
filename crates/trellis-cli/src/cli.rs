//! CLI argument definitions for Trellis.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "trellis",
    version,
    about = "Resolve configurations of a Trellis project",
    long_about = "Trellis resolves the dependency configurations of a project against a \
                  repository: version conflicts, variant selection by attributes, and \
                  project-to-project dependencies."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to Trellis.toml (defaults to the nearest one above the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve configurations and list the selected components
    Resolve {
        /// Configuration to resolve (defaults to every resolvable one)
        configuration: Option<String>,
        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
        /// Ignore Trellis.lock
        #[arg(long)]
        no_lock: bool,
    },

    /// Print the dependency tree of a configuration
    Tree {
        /// Configuration to resolve
        #[arg(default_value = "runtimeClasspath")]
        configuration: String,
        /// Maximum depth
        #[arg(long)]
        depth: Option<usize>,
        /// Show who depends on the given component instead
        #[arg(long, value_name = "COMPONENT")]
        inverted: Option<String>,
        /// Show version conflicts
        #[arg(long)]
        conflicts: bool,
    },

    /// Explain why a component is part of a configuration
    Why {
        /// Component to explain, e.g. org.example:lib or :lib
        component: String,
        /// Configuration to resolve
        #[arg(short, long, default_value = "runtimeClasspath")]
        configuration: String,
    },

    /// Resolve every resolvable configuration and write Trellis.lock
    Lock,
}

/// Parse command-line arguments into the [`Cli`] struct.
pub fn parse() -> Cli {
    Cli::parse()
}
