//! Entry point: resolving one configuration, or every resolvable
//! configuration of a project side by side.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use trellis_core::attributes::AttributesSchema;
use trellis_core::config::GlobalConfig;
use trellis_core::dependency::ModuleId;
use trellis_core::lockfile::Lockfile;
use trellis_core::manifest::{ConflictStrategy, Manifest};
use trellis_core::project::{Project, ProjectRegistry, ResolutionRequest};

use crate::builder::GraphBuilder;
use crate::cache::MetadataCache;
use crate::cancel::CancellationFlag;
use crate::failure::{Failure, Provenance, ResolutionFailure};
use crate::graph::ResolvedGraph;
use crate::source::MetadataSource;

const MAX_CONCURRENT_FETCHES: usize = 8;
const MAX_ITERATIONS: usize = 32;

/// Knobs for one resolver.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub strategy: ConflictStrategy,
    /// Traversal passes allowed before giving up on a fixed point.
    pub max_iterations: usize,
    pub max_concurrent_fetches: usize,
    /// Configurations resolved at the same time by [`Resolver::resolve_all`].
    pub jobs: usize,
    /// Versions forced for the whole resolution.
    pub forced: Vec<(ModuleId, String)>,
    /// Locked versions become strict constraints.
    pub lockfile: Option<Lockfile>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            strategy: ConflictStrategy::default(),
            max_iterations: MAX_ITERATIONS,
            max_concurrent_fetches: MAX_CONCURRENT_FETCHES,
            jobs: GlobalConfig::default().resolution.jobs,
            forced: Vec::new(),
            lockfile: None,
        }
    }
}

impl ResolverOptions {
    /// Options from a manifest's `[resolution]` table, with the global
    /// configuration's overrides applied.
    pub fn from_manifest(manifest: &Manifest, global: &GlobalConfig) -> miette::Result<Self> {
        let resolution = &manifest.resolution;
        Ok(Self {
            strategy: resolution.strategy,
            max_iterations: resolution.max_iterations,
            max_concurrent_fetches: global
                .resolution
                .max_concurrent_fetches
                .unwrap_or(resolution.max_concurrent_fetches),
            jobs: global.resolution.jobs.max(1),
            forced: resolution.forced_modules()?,
            lockfile: None,
        })
    }

    pub fn with_lockfile(mut self, lockfile: Lockfile) -> Self {
        self.lockfile = Some(lockfile);
        self
    }
}

/// Resolves configurations against a metadata source.
///
/// Cheap to clone: the cache, project registry and schema are shared, so
/// every configuration resolved by one resolver reuses the same metadata.
#[derive(Debug, Clone)]
pub struct Resolver {
    cache: Arc<MetadataCache>,
    projects: Arc<ProjectRegistry>,
    schema: Arc<AttributesSchema>,
    options: Arc<ResolverOptions>,
    cancellation: CancellationFlag,
}

impl Resolver {
    pub fn new(source: impl MetadataSource + 'static) -> Self {
        Self::with_cache(Arc::new(MetadataCache::new(Arc::new(source))))
    }

    /// A resolver sharing an existing cache.
    pub fn with_cache(cache: Arc<MetadataCache>) -> Self {
        Self {
            cache,
            projects: Arc::new(ProjectRegistry::new()),
            schema: Arc::new(AttributesSchema::new()),
            options: Arc::new(ResolverOptions::default()),
            cancellation: CancellationFlag::new(),
        }
    }

    pub fn with_projects(mut self, projects: ProjectRegistry) -> Self {
        self.projects = Arc::new(projects);
        self
    }

    pub fn with_schema(mut self, schema: AttributesSchema) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// The flag that stops every resolution run by this resolver.
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Resolve a snapshot of one configuration. Always returns a graph;
    /// problems are listed in [`ResolvedGraph::failures`].
    pub async fn resolve(&self, request: &ResolutionRequest) -> ResolvedGraph {
        tracing::debug!(
            "Resolving {} of {} ({} declared dependencies)",
            request.configuration,
            request.project,
            request.dependencies.len()
        );
        let graph = GraphBuilder::new(
            request,
            &self.cache,
            &self.projects,
            &self.schema,
            &self.options,
            &self.cancellation,
        )
        .build()
        .await;
        tracing::debug!(
            "Resolved {}: {} components, {} failures, {} passes",
            request.configuration,
            graph.components().len(),
            graph.failures().len(),
            graph.iterations()
        );
        graph
    }

    /// Resolve the named configuration of `project`. A configuration that
    /// cannot be resolved yields a graph holding only that failure.
    pub async fn resolve_configuration(&self, project: &Project, name: &str) -> ResolvedGraph {
        match project.resolution_request(name) {
            Ok(request) => self.resolve(&request).await,
            Err(e) => {
                let provenance = Provenance {
                    configuration: name.to_string(),
                    declared_in: project.identity.to_string(),
                    path: Vec::new(),
                    dependency: format!("configuration {name}"),
                };
                ResolvedGraph::failed(
                    project.identity.clone(),
                    name,
                    Failure::new(
                        ResolutionFailure::configuration(
                            e,
                            format!("configuration {name} of {}", project.identity),
                        ),
                        Some(provenance),
                    ),
                )
            }
        }
    }

    /// Resolve every resolvable configuration of `project`, at most
    /// `jobs` at a time. Each configuration runs on its own task, so a
    /// failure in one never affects another.
    pub async fn resolve_all(&self, project: &Project) -> BTreeMap<String, ResolvedGraph> {
        let semaphore = Arc::new(Semaphore::new(self.options.jobs.max(1)));
        let shared = Arc::new(project.clone());
        let mut join_set = JoinSet::new();
        for name in project.resolvable_configurations() {
            let resolver = self.clone();
            let sem = Arc::clone(&semaphore);
            let project = Arc::clone(&shared);
            join_set.spawn(async move {
                let _permit = sem.acquire().await;
                let graph = resolver.resolve_configuration(&project, &name).await;
                (name, graph)
            });
        }

        let mut graphs = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, graph)) => {
                    graphs.insert(name, graph);
                }
                Err(e) => tracing::error!("Resolution task failed: {e}"),
            }
        }
        graphs
    }
}
