//! Dependency and variant resolution: version ordering and ranges, conflict
//! resolution, attribute-based variant matching, and the resolved graph.

mod builder;
pub mod cache;
pub mod cancel;
pub mod conflict;
pub mod failure;
pub mod graph;
pub mod resolver;
pub mod selector;
pub mod source;
pub mod variant;
pub mod version;

pub use cancel::CancellationFlag;
pub use failure::{Failure, ResolutionFailure};
pub use graph::ResolvedGraph;
pub use resolver::{Resolver, ResolverOptions};
pub use source::{MetadataSource, RepositoryFixture, SourceError};
