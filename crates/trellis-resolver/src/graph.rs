//! The resolved dependency graph and its queries.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use trellis_core::component::{Artifact, Variant};
use trellis_core::dependency::{Dependency, DependencyTarget, FileSet, ModuleId};
use trellis_core::lockfile::{LockedConfiguration, LockedPackage};
use trellis_core::project::ProjectIdentity;

use crate::conflict::ConflictReport;
use crate::failure::{Failure, Provenance, ResolutionFailure};

/// Identity used to deduplicate nodes: one node per key per resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKey {
    Root,
    Module(ModuleId),
    Project(String),
    Files(FileSet),
}

impl ComponentKey {
    /// Key of the component a dependency points at.
    pub fn of(dependency: &Dependency) -> Self {
        match &dependency.target {
            DependencyTarget::Module { module, .. } => ComponentKey::Module(module.clone()),
            DependencyTarget::Project { path, .. } => ComponentKey::Project(path.clone()),
            DependencyTarget::Files(files) => ComponentKey::Files(files.clone()),
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKey::Root => write!(f, "root"),
            ComponentKey::Module(module) => write!(f, "{module}"),
            ComponentKey::Project(path) => write!(f, "{path}"),
            ComponentKey::Files(files) => write!(f, "{files}"),
        }
    }
}

/// What a resolved node is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ComponentId {
    /// The configuration being resolved.
    Root {
        project: ProjectIdentity,
        configuration: String,
    },
    Module {
        module: ModuleId,
        version: String,
    },
    Project {
        project: ProjectIdentity,
    },
    Files {
        files: FileSet,
    },
}

impl ComponentId {
    pub fn key(&self) -> ComponentKey {
        match self {
            ComponentId::Root { .. } => ComponentKey::Root,
            ComponentId::Module { module, .. } => ComponentKey::Module(module.clone()),
            ComponentId::Project { project } => ComponentKey::Project(project.path.clone()),
            ComponentId::Files { files } => ComponentKey::Files(files.clone()),
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentId::Root {
                project,
                configuration,
            } => write!(f, "{project} ({configuration})"),
            ComponentId::Module { module, version } => write!(f, "{module}:{version}"),
            ComponentId::Project { project } => write!(f, "{project}"),
            ComponentId::Files { files } => write!(f, "{files}"),
        }
    }
}

/// A node of the resolved graph: the selected component and variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedComponentResult {
    pub id: ComponentId,
    /// `None` for the root and for components whose variant could not be
    /// selected.
    pub variant: Option<Variant>,
    /// Why this version was selected.
    pub reason: Option<String>,
}

impl ResolvedComponentResult {
    pub fn selected_variant(&self) -> Option<&Variant> {
        self.variant.as_ref()
    }

    pub fn version(&self) -> Option<&str> {
        match &self.id {
            ComponentId::Module { version, .. } => Some(version),
            ComponentId::Project { project } => Some(&project.version),
            _ => None,
        }
    }

    pub fn key(&self) -> ComponentKey {
        self.id.key()
    }
}

impl fmt::Display for ResolvedComponentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(ref variant) = self.variant {
            if !matches!(self.id, ComponentId::Files { .. }) {
                write!(f, " [{}]", variant.name)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeOutcome {
    Resolved(NodeIndex),
    Failed(ResolutionFailure),
}

/// An edge: what was requested, from which node, and what came of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyResult {
    pub requested: Dependency,
    pub from: NodeIndex,
    pub outcome: EdgeOutcome,
    pub provenance: Provenance,
}

impl DependencyResult {
    pub fn to(&self) -> Option<NodeIndex> {
        match self.outcome {
            EdgeOutcome::Resolved(to) => Some(to),
            EdgeOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ResolutionFailure> {
        match &self.outcome {
            EdgeOutcome::Failed(failure) => Some(failure),
            EdgeOutcome::Resolved(_) => None,
        }
    }
}

/// The result of resolving one configuration: always a graph, possibly
/// partial, with every failure that was found.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    configuration: String,
    /// Edge weights index into `edges`.
    graph: DiGraph<ResolvedComponentResult, usize>,
    index: HashMap<ComponentKey, NodeIndex>,
    root: NodeIndex,
    edges: Vec<DependencyResult>,
    failures: Vec<Failure>,
    conflicts: ConflictReport,
    iterations: usize,
}

impl ResolvedGraph {
    pub fn new(project: ProjectIdentity, configuration: impl Into<String>) -> Self {
        let configuration = configuration.into();
        let mut graph = DiGraph::new();
        let root = graph.add_node(ResolvedComponentResult {
            id: ComponentId::Root {
                project,
                configuration: configuration.clone(),
            },
            variant: None,
            reason: None,
        });
        let mut index = HashMap::new();
        index.insert(ComponentKey::Root, root);
        Self {
            configuration,
            graph,
            index,
            root,
            edges: Vec::new(),
            failures: Vec::new(),
            conflicts: ConflictReport::new(),
            iterations: 0,
        }
    }

    /// A graph holding nothing but the root and one failure.
    pub fn failed(project: ProjectIdentity, configuration: &str, failure: Failure) -> Self {
        let mut graph = Self::new(project, configuration);
        graph.fail(failure);
        graph
    }

    /// Add a component, or return the node already holding its key.
    pub(crate) fn add_component(&mut self, component: ResolvedComponentResult) -> NodeIndex {
        let key = component.key();
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(component);
        self.index.insert(key, idx);
        idx
    }

    pub(crate) fn add_dependency(&mut self, dependency: DependencyResult) {
        let edge = self.edges.len();
        match &dependency.outcome {
            EdgeOutcome::Resolved(to) => {
                if self.graph.find_edge(dependency.from, *to).is_none() {
                    self.graph.add_edge(dependency.from, *to, edge);
                }
            }
            // Several edges into one failed component report it once.
            EdgeOutcome::Failed(failure) => {
                if !self.failures.iter().any(|f| f.failure == *failure) {
                    self.failures
                        .push(Failure::new(failure.clone(), Some(dependency.provenance.clone())));
                }
            }
        }
        self.edges.push(dependency);
    }

    pub(crate) fn index_of(&self, key: &ComponentKey) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    pub(crate) fn fail(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    pub(crate) fn set_conflicts(&mut self, conflicts: ConflictReport) {
        self.conflicts = conflicts;
    }

    pub(crate) fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations;
    }

    /// Report every dependency cycle and cut it at the edge that closes it.
    ///
    /// Three-colour depth-first search from the root over edges in
    /// declaration order: an edge reaching a node that is still in progress
    /// closes a cycle.
    pub(crate) fn break_cycles(&mut self) {
        let mut outgoing: HashMap<NodeIndex, Vec<usize>> = HashMap::new();
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.to().is_some() {
                outgoing.entry(edge.from).or_default().push(i);
            }
        }

        let mut done: HashSet<NodeIndex> = HashSet::new();
        let mut stack: Vec<NodeIndex> = Vec::new();
        let mut closing: Vec<(usize, Vec<String>)> = Vec::new();
        self.cycle_dfs(self.root, &outgoing, &mut stack, &mut done, &mut closing);

        for (edge, path) in closing {
            let (from, to) = match self.edges[edge].to() {
                Some(to) => (self.edges[edge].from, to),
                None => continue,
            };
            let failure = ResolutionFailure::DependencyCycle { path };
            tracing::debug!("{failure}");
            if let Some(e) = self.graph.find_edge(from, to) {
                self.graph.remove_edge(e);
            }
            self.failures.push(Failure::new(
                failure.clone(),
                Some(self.edges[edge].provenance.clone()),
            ));
            for parallel in self.edges.iter_mut() {
                if parallel.from == from && parallel.to() == Some(to) {
                    parallel.outcome = EdgeOutcome::Failed(failure.clone());
                }
            }
        }
    }

    fn cycle_dfs(
        &self,
        node: NodeIndex,
        outgoing: &HashMap<NodeIndex, Vec<usize>>,
        stack: &mut Vec<NodeIndex>,
        done: &mut HashSet<NodeIndex>,
        closing: &mut Vec<(usize, Vec<String>)>,
    ) {
        stack.push(node);
        for &edge in outgoing.get(&node).into_iter().flatten() {
            let Some(to) = self.edges[edge].to() else {
                continue;
            };
            if let Some(start) = stack.iter().position(|&n| n == to) {
                if closing.iter().any(|(e, _)| {
                    self.edges[*e].from == node && self.edges[*e].to() == Some(to)
                }) {
                    continue;
                }
                let path = stack[start..]
                    .iter()
                    .chain(std::iter::once(&to))
                    .map(|&n| self.graph[n].key().to_string())
                    .collect();
                closing.push((edge, path));
            } else if !done.contains(&to) {
                self.cycle_dfs(to, outgoing, stack, done, closing);
            }
        }
        stack.pop();
        done.insert(node);
    }

    /// Name of the resolved configuration.
    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, idx: NodeIndex) -> &ResolvedComponentResult {
        &self.graph[idx]
    }

    /// Every node, root first, in the order they were reached.
    pub fn components(&self) -> Vec<&ResolvedComponentResult> {
        self.graph.node_indices().map(|idx| &self.graph[idx]).collect()
    }

    pub fn dependencies(&self) -> &[DependencyResult] {
        &self.edges
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn conflicts(&self) -> &ConflictReport {
        &self.conflicts
    }

    /// Traversal passes it took to reach a fixed point.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn find(&self, module: &ModuleId) -> Option<&ResolvedComponentResult> {
        self.index
            .get(&ComponentKey::Module(module.clone()))
            .map(|&idx| &self.graph[idx])
    }

    /// Resolve a user-provided key to a node.
    ///
    /// Tries the exact key (`group:name`, `:project`) first, then a module
    /// or project name on its own.
    pub fn find_key(&self, key: &str) -> Option<NodeIndex> {
        let mut candidates: Vec<(ComponentKey, NodeIndex)> =
            self.index.iter().map(|(k, &idx)| (k.clone(), idx)).collect();
        candidates.sort();
        if let Some((_, idx)) = candidates.iter().find(|(k, _)| k.to_string() == key) {
            return Some(*idx);
        }
        candidates
            .iter()
            .find(|(k, _)| match k {
                ComponentKey::Module(module) => module.name == key,
                ComponentKey::Project(path) => path.rsplit(':').next() == Some(key),
                _ => false,
            })
            .map(|(_, idx)| *idx)
    }

    /// Outgoing edges of a node, in declaration order.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<&DependencyResult> {
        self.edges.iter().filter(|e| e.from == idx).collect()
    }

    /// Nodes with a resolved edge into `idx`.
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut dependents: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.source())
            .collect();
        dependents.sort();
        dependents
    }

    /// Artifacts of every selected variant, breadth first from the root.
    pub fn artifacts(&self) -> Vec<&Artifact> {
        let mut seen_nodes = HashSet::from([self.root]);
        let mut seen_artifacts = HashSet::new();
        let mut queue = VecDeque::from([self.root]);
        let mut artifacts = Vec::new();
        while let Some(idx) = queue.pop_front() {
            if let Some(variant) = self.graph[idx].selected_variant() {
                for artifact in variant.artifacts() {
                    if seen_artifacts.insert(artifact) {
                        artifacts.push(artifact);
                    }
                }
            }
            for edge in self.dependencies_of(idx) {
                if let Some(to) = edge.to() {
                    if seen_nodes.insert(to) {
                        queue.push_back(to);
                    }
                }
            }
        }
        artifacts
    }

    /// Path from the root to the component named by `key`.
    pub fn find_path(&self, key: &str) -> Option<Vec<&ResolvedComponentResult>> {
        let target = self.find_key(key)?;
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([self.root]);
        let mut seen = HashSet::from([self.root]);
        while let Some(idx) = queue.pop_front() {
            if idx == target {
                let mut path = vec![&self.graph[idx]];
                let mut current = idx;
                while let Some(&p) = parent.get(&current) {
                    path.push(&self.graph[p]);
                    current = p;
                }
                path.reverse();
                return Some(path);
            }
            for edge in self.dependencies_of(idx) {
                if let Some(to) = edge.to() {
                    if seen.insert(to) {
                        parent.insert(to, idx);
                        queue.push_back(to);
                    }
                }
            }
        }
        None
    }

    /// Render the graph as a tree. Failed edges are shown in place.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = format!("{}\n", self.graph[self.root]);
        let mut visited = HashSet::from([self.root]);
        let edges = self.dependencies_of(self.root);
        let count = edges.len();
        for (i, edge) in edges.into_iter().enumerate() {
            self.print_subtree(&mut output, edge, "", i == count - 1, 1, max_depth, &mut visited);
        }
        output
    }

    fn edge_label(&self, edge: &DependencyResult) -> String {
        match &edge.outcome {
            EdgeOutcome::Failed(failure) => format!("{} FAILED: {failure}", edge.requested),
            EdgeOutcome::Resolved(to) => {
                let node = &self.graph[*to];
                match (&edge.requested.target, node.version()) {
                    (DependencyTarget::Module { constraint, .. }, Some(version))
                        if constraint.to_string() != version =>
                    {
                        format!("{} -> {version}{}", edge.requested, variant_suffix(node))
                    }
                    _ => node.to_string(),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        edge: &DependencyResult,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let Some(idx) = edge.to() else {
            output.push_str(&format!("{prefix}{connector}{}\n", self.edge_label(edge)));
            return;
        };
        if !visited.insert(idx) {
            output.push_str(&format!("{prefix}{connector}{} (*)\n", self.edge_label(edge)));
            return;
        }
        output.push_str(&format!("{prefix}{connector}{}\n", self.edge_label(edge)));

        if max_depth.map_or(true, |max| depth < max) {
            let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
            let children = self.dependencies_of(idx);
            let count = children.len();
            for (i, child) in children.into_iter().enumerate() {
                self.print_subtree(
                    output,
                    child,
                    &child_prefix,
                    i == count - 1,
                    depth + 1,
                    max_depth,
                    visited,
                );
            }
        }
    }

    /// Render who depends on the component named by `key`, down to the root.
    pub fn print_inverted_tree(&self, key: &str) -> String {
        let mut output = String::new();
        let Some(idx) = self.find_key(key) else {
            return output;
        };
        output.push_str(&format!("{}\n", self.graph[idx]));
        let mut visited = HashSet::from([idx]);
        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, dep) in dependents.into_iter().enumerate() {
            self.print_inverted_subtree(&mut output, dep, "", i == count - 1, &mut visited);
        }
        output
    }

    fn print_inverted_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{}\n", self.graph[idx]));
        if !visited.insert(idx) {
            return;
        }
        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, dep) in dependents.into_iter().enumerate() {
            self.print_inverted_subtree(output, dep, &child_prefix, i == count - 1, visited);
        }
        visited.remove(&idx);
    }

    /// The locked form of this graph: every resolved module with its
    /// version, variant and direct module dependencies.
    pub fn to_lockfile(&self) -> LockedConfiguration {
        let mut package: Vec<LockedPackage> = self
            .graph
            .node_indices()
            .filter_map(|idx| {
                let node = &self.graph[idx];
                let ComponentId::Module { module, version } = &node.id else {
                    return None;
                };
                let mut dependencies: Vec<String> = self
                    .dependencies_of(idx)
                    .into_iter()
                    .filter_map(|e| e.to())
                    .filter_map(|to| match &self.graph[to].id {
                        ComponentId::Module { module, .. } => Some(module.to_string()),
                        _ => None,
                    })
                    .collect();
                dependencies.sort();
                dependencies.dedup();
                Some(LockedPackage {
                    group: module.group.clone(),
                    name: module.name.clone(),
                    version: version.clone(),
                    variant: node.variant.as_ref().map(|v| v.name.clone()),
                    dependencies,
                })
            })
            .collect();
        package.sort_by(|a, b| (&a.group, &a.name).cmp(&(&b.group, &b.name)));
        LockedConfiguration {
            name: self.configuration.clone(),
            package,
        }
    }

    /// A serializable summary for machine-readable output.
    pub fn report(&self) -> GraphReport {
        GraphReport {
            configuration: self.configuration.clone(),
            success: self.is_success(),
            iterations: self.iterations,
            components: self
                .components()
                .into_iter()
                .filter(|c| !matches!(c.id, ComponentId::Root { .. }))
                .map(|c| ComponentReport {
                    id: c.id.clone(),
                    variant: c.variant.as_ref().map(|v| v.name.clone()),
                    reason: c.reason.clone(),
                    artifacts: c
                        .selected_variant()
                        .map(|v| v.artifacts().to_vec())
                        .unwrap_or_default(),
                })
                .collect(),
            conflicts: self
                .conflicts
                .conflicts
                .iter()
                .map(|c| c.to_string())
                .collect(),
            failures: self
                .failures
                .iter()
                .map(|f| FailureReport {
                    kind: f.failure.kind(),
                    message: f.failure.to_string(),
                    provenance: f.provenance.clone(),
                })
                .collect(),
        }
    }
}

fn variant_suffix(node: &ResolvedComponentResult) -> String {
    node.variant
        .as_ref()
        .map(|v| format!(" [{}]", v.name))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphReport {
    pub configuration: String,
    pub success: bool,
    pub iterations: usize,
    pub components: Vec<ComponentReport>,
    pub conflicts: Vec<String>,
    pub failures: Vec<FailureReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    pub id: ComponentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}
