//! Shared utilities for the Trellis resolver.
//!
//! This crate provides the cross-cutting error type used by every other
//! Trellis crate, manifest and lockfile location helpers, and the styled
//! status lines printed by the CLI.

pub mod errors;
pub mod fs;
pub mod status;
