//! Building a resolved graph for one configuration.
//!
//! Traversal is breadth first, one level at a time. Metadata for a whole
//! level is prefetched concurrently and joined before the level is
//! processed, so processing itself is sequential and deterministic.
//!
//! Version and attribute decisions made while traversing are provisional:
//! a module may be reached at one version before a deeper edge asks for a
//! newer one. After each pass every decision is recomputed from all the
//! constraints seen; if any differ, the graph is traversed again using the
//! settled decisions, until nothing changes or the iteration limit is hit.
//!
//! The builder never calls the metadata source itself. Everything it reads
//! was prefetched under the fetch timeout first, and a fetch that timed out
//! stays failed for the rest of this resolution only.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use petgraph::graph::NodeIndex;

use trellis_core::attributes::{AttributeSet, AttributesSchema};
use trellis_core::component::{Artifact, ComponentMetadata, Variant};
use trellis_core::dependency::{Dependency, DependencyTarget, ModuleId, VersionConstraint};
use trellis_core::project::{ProjectRegistry, ResolutionRequest};

use crate::cache::{MetadataCache, Prefetch};
use crate::cancel::CancellationFlag;
use crate::conflict::{needs_listing, resolve_conflicts, ConflictReport, Selection};
use crate::failure::{Failure, Provenance, RequestedConstraint, ResolutionFailure};
use crate::graph::{
    ComponentId, ComponentKey, DependencyResult, EdgeOutcome, ResolvedComponentResult,
    ResolvedGraph,
};
use crate::resolver::ResolverOptions;
use crate::source::SourceError;
use crate::variant::select_variant;

type VersionOutcome = Result<Selection, ResolutionFailure>;
type AttributeOutcome = Result<AttributeSet, ResolutionFailure>;

/// Version and attribute choices, per module and per component.
#[derive(Debug, Default)]
struct Decisions {
    versions: BTreeMap<ModuleId, VersionOutcome>,
    attributes: BTreeMap<ComponentKey, AttributeOutcome>,
}

impl Decisions {
    /// Whether every choice made in `self` is also the settled one.
    fn agrees_with(&self, settled: &Decisions) -> bool {
        let versions = self.versions.iter().all(|(module, used)| {
            settled
                .versions
                .get(module)
                .is_some_and(|s| s.as_ref().map(|s| &s.version) == used.as_ref().map(|u| &u.version))
        });
        let attributes = self
            .attributes
            .iter()
            .all(|(key, used)| settled.attributes.get(key) == Some(used));
        versions && attributes
    }
}

/// A dependency waiting to be visited.
struct Pending {
    dependency: Dependency,
    from: NodeIndex,
    provenance: Provenance,
}

/// State of one traversal pass.
struct Pass {
    graph: ResolvedGraph,
    constraints: BTreeMap<ModuleId, Vec<RequestedConstraint>>,
    requests: BTreeMap<ComponentKey, Vec<AttributeSet>>,
    used: Decisions,
    failed: HashMap<ComponentKey, ResolutionFailure>,
    /// Component ids from the root down to each node, root excluded.
    paths: HashMap<NodeIndex, Vec<String>>,
}

enum Traversal {
    Complete(Pass),
    Cancelled(ResolvedGraph),
}

pub(crate) struct GraphBuilder<'a> {
    request: &'a ResolutionRequest,
    cache: &'a Arc<MetadataCache>,
    projects: &'a ProjectRegistry,
    schema: &'a AttributesSchema,
    options: &'a ResolverOptions,
    cancellation: &'a CancellationFlag,
    /// Fetches that timed out or failed transiently during this resolution.
    transient: DashMap<Prefetch, SourceError>,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(
        request: &'a ResolutionRequest,
        cache: &'a Arc<MetadataCache>,
        projects: &'a ProjectRegistry,
        schema: &'a AttributesSchema,
        options: &'a ResolverOptions,
        cancellation: &'a CancellationFlag,
    ) -> Self {
        Self {
            request,
            cache,
            projects,
            schema,
            options,
            cancellation,
            transient: DashMap::new(),
        }
    }

    pub(crate) async fn build(self) -> ResolvedGraph {
        let injected = self.injected_constraints();
        let max_iterations = self.options.max_iterations.max(1);
        let mut decided = Decisions::default();
        let mut iteration = 0;
        loop {
            iteration += 1;
            let pass = match self.traverse(&decided, &injected).await {
                Traversal::Complete(pass) => pass,
                Traversal::Cancelled(mut graph) => {
                    tracing::info!("Resolution of {} cancelled", self.request.configuration);
                    graph.fail(Failure::new(ResolutionFailure::Cancelled, None));
                    graph.set_iterations(iteration);
                    return graph;
                }
            };

            let settled = self.settle(&pass).await;
            let converged = pass.used.agrees_with(&settled);
            if converged || iteration >= max_iterations {
                let mut graph = pass.graph;
                let mut conflicts = ConflictReport::new();
                for (module, outcome) in &settled.versions {
                    if let Ok(selection) = outcome {
                        conflicts.record(module, selection);
                    }
                }
                graph.set_conflicts(conflicts);
                graph.set_iterations(iteration);
                graph.break_cycles();
                if !converged {
                    tracing::warn!(
                        "Resolution of {} did not converge after {iteration} passes",
                        self.request.configuration
                    );
                    graph.fail(Failure::new(
                        ResolutionFailure::ResolutionDidNotConverge {
                            iterations: iteration,
                        },
                        None,
                    ));
                }
                return graph;
            }
            tracing::debug!("Pass {iteration} changed selections, traversing again");
            decided = settled;
        }
    }

    /// Constraints every module gets on top of what the graph asks for:
    /// forces from the resolution strategy and versions from the lockfile.
    fn injected_constraints(&self) -> BTreeMap<ModuleId, Vec<RequestedConstraint>> {
        let mut injected: BTreeMap<ModuleId, Vec<RequestedConstraint>> = BTreeMap::new();
        let forced = self
            .options
            .forced
            .iter()
            .map(|(m, v)| (m, VersionConstraint::forced(v.as_str()), "resolution strategy"));
        let locked_versions = self
            .options
            .lockfile
            .as_ref()
            .map(|lock| lock.locked_versions(&self.request.configuration))
            .unwrap_or_default();
        let locked = locked_versions
            .iter()
            .map(|(m, v)| (m, VersionConstraint::strictly(v.as_str()), "lockfile"));
        for (module, constraint, source) in forced.chain(locked) {
            let provenance = Provenance {
                configuration: self.request.configuration.clone(),
                declared_in: source.to_string(),
                path: Vec::new(),
                dependency: format!("{module}:{constraint}"),
            };
            injected
                .entry(module.clone())
                .or_default()
                .push(RequestedConstraint {
                    constraint,
                    provenance,
                });
        }
        injected
    }

    async fn traverse(
        &self,
        decided: &Decisions,
        injected: &BTreeMap<ModuleId, Vec<RequestedConstraint>>,
    ) -> Traversal {
        let mut pass = Pass {
            graph: ResolvedGraph::new(
                self.request.project.clone(),
                self.request.configuration.as_str(),
            ),
            constraints: BTreeMap::new(),
            requests: BTreeMap::new(),
            used: Decisions::default(),
            failed: HashMap::new(),
            paths: HashMap::new(),
        };
        let root = pass.graph.root();
        pass.paths.insert(root, Vec::new());

        let mut frontier: Vec<Pending> = self
            .request
            .dependencies
            .iter()
            .map(|declared| Pending {
                provenance: Provenance {
                    configuration: self.request.configuration.clone(),
                    declared_in: declared.configuration.clone(),
                    path: Vec::new(),
                    dependency: declared.dependency.to_string(),
                },
                dependency: declared.dependency.clone(),
                from: root,
            })
            .collect();

        let mut level = 0;
        while !frontier.is_empty() {
            if self.cancellation.is_cancelled() {
                return Traversal::Cancelled(pass.graph);
            }
            level += 1;
            tracing::debug!(
                "{}: level {level}, {} dependencies",
                self.request.configuration,
                frontier.len()
            );

            self.record(&mut pass, &frontier, injected);

            let reached: BTreeSet<ModuleId> = frontier
                .iter()
                .filter_map(|p| p.dependency.module_id())
                .filter(|m| !pass.used.versions.contains_key(*m))
                .cloned()
                .collect();

            let listings: Vec<Prefetch> = reached
                .iter()
                .filter(|m| !decided.versions.contains_key(*m))
                .filter(|m| needs_listing(self.constraints_of(&pass, m)))
                .map(|m| Prefetch::Versions(m.clone()))
                .collect();
            self.prefetch(listings).await;

            for module in reached {
                let outcome = match decided.versions.get(&module) {
                    Some(outcome) => outcome.clone(),
                    None => self.select_version(&module, self.constraints_of(&pass, &module)),
                };
                pass.used.versions.insert(module, outcome);
            }

            let metadata: Vec<Prefetch> = frontier
                .iter()
                .filter_map(|p| p.dependency.module_id())
                .filter_map(|m| match pass.used.versions.get(m) {
                    Some(Ok(selection)) => Some(Prefetch::Metadata(m.clone(), selection.version.clone())),
                    _ => None,
                })
                .collect();
            self.prefetch(metadata).await;

            let mut next = Vec::new();
            for pending in frontier {
                if self.cancellation.is_cancelled() {
                    return Traversal::Cancelled(pass.graph);
                }
                self.visit(&mut pass, decided, pending, &mut next);
            }
            frontier = next;
        }
        Traversal::Complete(pass)
    }

    /// Fill the cache for `requests`. Anything that already failed
    /// transiently in this resolution is not asked for again.
    async fn prefetch(&self, requests: Vec<Prefetch>) {
        let requests: Vec<Prefetch> = requests
            .into_iter()
            .filter(|r| !self.transient.contains_key(r))
            .collect();
        if requests.is_empty() {
            return;
        }
        let failed = Arc::clone(self.cache)
            .prefetch(requests, self.options.max_concurrent_fetches)
            .await;
        for (request, error) in failed {
            self.transient.insert(request, error);
        }
    }

    fn listing(&self, module: &ModuleId) -> Result<Arc<Vec<String>>, SourceError> {
        let request = Prefetch::Versions(module.clone());
        self.fetched(&request, self.cache.cached_versions(module))
    }

    fn component_metadata(
        &self,
        module: &ModuleId,
        version: &str,
    ) -> Result<Arc<ComponentMetadata>, SourceError> {
        let request = Prefetch::Metadata(module.clone(), version.to_string());
        self.fetched(&request, self.cache.cached_metadata(module, version))
    }

    /// A transient failure sticks for the whole resolution, even if the
    /// late answer has reached the cache since, so every pass agrees.
    fn fetched<T>(
        &self,
        request: &Prefetch,
        cached: Option<Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        if let Some(error) = self.transient.get(request) {
            return Err(error.value().clone());
        }
        cached.unwrap_or_else(|| Err(SourceError::Other(format!("{request} was never fetched"))))
    }

    fn constraints_of<'p>(&self, pass: &'p Pass, module: &ModuleId) -> &'p [RequestedConstraint] {
        pass.constraints
            .get(module)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Note the version constraints and attribute requests of a level.
    fn record(
        &self,
        pass: &mut Pass,
        frontier: &[Pending],
        injected: &BTreeMap<ModuleId, Vec<RequestedConstraint>>,
    ) {
        for pending in frontier {
            let key = ComponentKey::of(&pending.dependency);
            match &pending.dependency.target {
                DependencyTarget::Module { module, constraint } => {
                    pass.constraints
                        .entry(module.clone())
                        .or_insert_with(|| injected.get(module).cloned().unwrap_or_default())
                        .push(RequestedConstraint {
                            constraint: constraint.clone(),
                            provenance: pending.provenance.clone(),
                        });
                }
                DependencyTarget::Project { .. } => {}
                DependencyTarget::Files(_) => continue,
            }
            pass.requests
                .entry(key)
                .or_default()
                .push(pending.dependency.attributes.clone());
        }
    }

    fn select_version(&self, module: &ModuleId, constraints: &[RequestedConstraint]) -> VersionOutcome {
        let listing = if needs_listing(constraints) {
            self.listing(module).map_err(|e| {
                let requested: Vec<String> =
                    constraints.iter().map(|c| c.constraint.to_string()).collect();
                ResolutionFailure::SelectorUnresolvable {
                    selector: format!("{module}:{}", requested.join(" & ")),
                    reason: e.to_string(),
                }
            })?
        } else {
            Arc::new(Vec::new())
        };
        resolve_conflicts(module, constraints, &listing, self.options.strategy)
    }

    /// Merge the attribute requests of every edge into a component with the
    /// configuration's own attributes. Two edges disagreeing on a value is
    /// a failure.
    fn merge_requests(&self, key: &ComponentKey, requests: &[AttributeSet]) -> AttributeOutcome {
        let mut merged = AttributeSet::new();
        for request in requests {
            for (name, value) in request.iter() {
                let clash = merged.get(name).is_some_and(|existing| existing != value);
                if clash {
                    let mut values: Vec<String> = requests
                        .iter()
                        .filter_map(|r| r.get(name))
                        .map(str::to_string)
                        .collect();
                    values.sort();
                    values.dedup();
                    return Err(ResolutionFailure::ConflictingAttributeRequest {
                        component: key.to_string(),
                        attribute: name.to_string(),
                        values,
                    });
                }
                merged.insert(name, value);
            }
        }
        Ok(self.request.attributes.merged(&merged))
    }

    /// Recompute every decision from everything the pass has seen.
    async fn settle(&self, pass: &Pass) -> Decisions {
        // Modules first reached at a plain version may have picked up a
        // range since, so their listings can still be missing.
        let listings: Vec<Prefetch> = pass
            .constraints
            .iter()
            .filter(|(_, constraints)| needs_listing(constraints))
            .map(|(module, _)| Prefetch::Versions(module.clone()))
            .collect();
        self.prefetch(listings).await;

        Decisions {
            versions: pass
                .constraints
                .iter()
                .map(|(module, constraints)| (module.clone(), self.select_version(module, constraints)))
                .collect(),
            attributes: pass
                .requests
                .iter()
                .map(|(key, requests)| (key.clone(), self.merge_requests(key, requests)))
                .collect(),
        }
    }

    fn visit(&self, pass: &mut Pass, decided: &Decisions, pending: Pending, next: &mut Vec<Pending>) {
        let key = ComponentKey::of(&pending.dependency);
        let outcome = if let Some(failure) = pass.failed.get(&key) {
            EdgeOutcome::Failed(failure.clone())
        } else if let Some(idx) = pass.graph.index_of(&key) {
            EdgeOutcome::Resolved(idx)
        } else {
            match self.materialize(pass, decided, &key, &pending.dependency) {
                Ok(component) => {
                    let label = component.to_string();
                    let mut path = pass.paths.get(&pending.from).cloned().unwrap_or_default();
                    path.push(component.id.to_string());
                    let children = component
                        .selected_variant()
                        .map(|v| v.dependencies.clone())
                        .unwrap_or_default();
                    let idx = pass.graph.add_component(component);
                    for dependency in children {
                        next.push(Pending {
                            provenance: Provenance {
                                configuration: self.request.configuration.clone(),
                                declared_in: label.clone(),
                                path: path.clone(),
                                dependency: dependency.to_string(),
                            },
                            dependency,
                            from: idx,
                        });
                    }
                    pass.paths.insert(idx, path);
                    EdgeOutcome::Resolved(idx)
                }
                Err(failure) => {
                    tracing::debug!("{key}: {failure}");
                    pass.failed.insert(key, failure.clone());
                    EdgeOutcome::Failed(failure)
                }
            }
        };
        pass.graph.add_dependency(DependencyResult {
            requested: pending.dependency,
            from: pending.from,
            outcome,
            provenance: pending.provenance,
        });
    }

    fn requested_attributes(
        &self,
        pass: &mut Pass,
        decided: &Decisions,
        key: &ComponentKey,
    ) -> AttributeOutcome {
        let outcome = match decided.attributes.get(key) {
            Some(outcome) => outcome.clone(),
            None => self.merge_requests(key, pass.requests.get(key).map(Vec::as_slice).unwrap_or(&[])),
        };
        pass.used.attributes.insert(key.clone(), outcome.clone());
        outcome
    }

    /// Turn the first edge into a component into a node.
    fn materialize(
        &self,
        pass: &mut Pass,
        decided: &Decisions,
        key: &ComponentKey,
        dependency: &Dependency,
    ) -> Result<ResolvedComponentResult, ResolutionFailure> {
        match &dependency.target {
            DependencyTarget::Files(files) => {
                let mut variant = Variant::new("files", AttributeSet::new());
                variant.artifacts = files.files.iter().map(Artifact::new).collect();
                Ok(ResolvedComponentResult {
                    id: ComponentId::Files {
                        files: files.clone(),
                    },
                    variant: Some(variant),
                    reason: None,
                })
            }
            DependencyTarget::Project {
                path,
                configuration,
            } => {
                let attributes = self.requested_attributes(pass, decided, key)?;
                let project =
                    self.projects
                        .get(path)
                        .ok_or_else(|| ResolutionFailure::SelectorUnresolvable {
                            selector: format!("project {path}"),
                            reason: "no such project in this build".to_string(),
                        })?;
                let variant = match configuration {
                    Some(name) => project.variant(name).map_err(|e| {
                        ResolutionFailure::configuration(
                            e,
                            format!("configuration {name} of {}", project.identity),
                        )
                    })?,
                    None => {
                        let variants = project.variants().map_err(|e| {
                            ResolutionFailure::configuration(e, format!("variants of {}", project.identity))
                        })?;
                        select_variant(path, &variants, &attributes, self.schema)?.clone()
                    }
                };
                Ok(ResolvedComponentResult {
                    id: ComponentId::Project {
                        project: project.identity.clone(),
                    },
                    variant: Some(variant),
                    reason: None,
                })
            }
            DependencyTarget::Module { module, .. } => {
                let selection = pass
                    .used
                    .versions
                    .get(module)
                    .cloned()
                    .unwrap_or_else(|| self.select_version(module, self.constraints_of(pass, module)))?;
                let attributes = self.requested_attributes(pass, decided, key)?;
                let component = format!("{module}:{}", selection.version);
                let metadata = self.component_metadata(module, &selection.version).map_err(|e| {
                    ResolutionFailure::SelectorUnresolvable {
                        selector: component.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let variant = select_variant(&component, &metadata.variants, &attributes, self.schema)?;
                Ok(ResolvedComponentResult {
                    id: ComponentId::Module {
                        module: module.clone(),
                        version: selection.version.clone(),
                    },
                    variant: Some(variant.clone()),
                    reason: Some(selection.reason.to_string()),
                })
            }
        }
    }
}
