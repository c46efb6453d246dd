//! Core data types for the Trellis dependency resolver.
//!
//! This crate defines the inputs to resolution: module identities, attribute
//! sets and their matching schema, version constraints, the uniform
//! [`dependency::Dependency`] produced by notation coercion, role-based
//! configurations and the project model that owns them, component metadata,
//! the `Trellis.toml` manifest, global configuration, and lockfiles.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod attributes;
pub mod component;
pub mod config;
pub mod configuration;
pub mod dependency;
pub mod lockfile;
pub mod manifest;
pub mod notation;
pub mod project;
