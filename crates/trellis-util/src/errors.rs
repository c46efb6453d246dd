use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Trellis operations.
#[derive(Debug, Error, Diagnostic)]
pub enum TrellisError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed manifest (e.g. Trellis.toml).
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check your Trellis.toml for syntax errors"))]
    Manifest { message: String },

    /// A configuration was declared or used against its role.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check the role and extends-from edges of the configuration"))]
    Configuration { message: String },

    /// A dependency notation could not be turned into a dependency.
    #[error("Invalid dependency notation: {message}")]
    Notation { message: String },

    /// Dependency resolution failed (version conflicts, missing variants, cycles).
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type TrellisResult<T> = miette::Result<T>;
