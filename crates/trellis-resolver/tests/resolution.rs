use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use trellis_core::attributes::{AttributeSet, AttributesSchema};
use trellis_core::component::ComponentMetadata;
use trellis_core::dependency::ModuleId;
use trellis_core::lockfile::Lockfile;
use trellis_core::manifest::{ConflictStrategy, Manifest};
use trellis_core::notation::NotationRegistry;
use trellis_core::project::{Project, ProjectRegistry};
use trellis_resolver::cache::MetadataCache;
use trellis_resolver::graph::ComponentId;
use trellis_resolver::variant::select_variant;
use trellis_resolver::{
    CancellationFlag, MetadataSource, RepositoryFixture, ResolutionFailure, ResolvedGraph,
    Resolver, ResolverOptions, SourceError,
};

/// A repository where every component has a single `runtime` variant.
fn repo(components: &[(&str, &str, &[&str])]) -> RepositoryFixture {
    let mut toml = String::new();
    for (module, version, deps) in components {
        let name = module.rsplit(':').next().unwrap();
        let deps: Vec<String> = deps.iter().map(|d| format!("{d:?}")).collect();
        toml.push_str(&format!(
            r#"
[[component]]
module = "{module}"
version = "{version}"

[[component.variant]]
name = "runtime"
attributes = {{ usage = "runtime" }}
artifacts = ["{name}-{version}.jar"]
dependencies = [{}]
"#,
            deps.join(", ")
        ));
    }
    RepositoryFixture::from_str(&toml, &NotationRegistry::default()).unwrap()
}

fn manifest(dependencies: &str, extra: &str) -> Manifest {
    Manifest::from_str(&format!(
        r#"
[project]
name = "app"
group = "com.example"
version = "1.0"
path = ":app"

[configurations.implementation]
role = "bucket"
dependencies = [{dependencies}]

[configurations.runtimeClasspath]
role = "resolvable"
extends-from = ["implementation"]
attributes = {{ usage = "runtime" }}
{extra}
"#
    ))
    .unwrap()
}

fn app(dependencies: &str) -> Project {
    manifest(dependencies, "")
        .into_project(&NotationRegistry::default())
        .unwrap()
}

async fn resolve(resolver: &Resolver, project: &Project) -> ResolvedGraph {
    resolver.resolve_configuration(project, "runtimeClasspath").await
}

fn version_of(graph: &ResolvedGraph, module: &str) -> Option<String> {
    let module = ModuleId::parse(module).unwrap();
    graph.find(&module).and_then(|c| c.version()).map(str::to_string)
}

fn kinds(graph: &ResolvedGraph) -> Vec<&'static str> {
    graph.failures().iter().map(|f| f.failure.kind()).collect()
}

#[tokio::test]
async fn strict_version_inside_range_wins() {
    let resolver = Resolver::new(repo(&[
        ("lib:foo", "1.0", &[]),
        ("lib:foo", "1.5", &[]),
        ("lib:foo", "1.9", &[]),
        ("lib:foo", "2.0", &[]),
    ]));
    let graph = resolve(&resolver, &app(r#""lib:foo:[1.0,2.0)", "lib:foo:1.5!!""#)).await;
    assert!(graph.is_success(), "{:?}", graph.failures());
    assert_eq!(version_of(&graph, "lib:foo").as_deref(), Some("1.5"));
}

#[tokio::test]
async fn newest_plain_version_wins() {
    let resolver = Resolver::new(repo(&[("lib:foo", "1.0", &[]), ("lib:foo", "2.0", &[])]));
    let graph = resolve(&resolver, &app(r#""lib:foo:1.0", "lib:foo:2.0""#)).await;
    assert!(graph.is_success());
    assert_eq!(version_of(&graph, "lib:foo").as_deref(), Some("2.0"));
    assert_eq!(graph.conflicts().len(), 1);
    assert_eq!(graph.conflicts().conflicts[0].requested, vec!["1.0", "2.0"]);
}

#[tokio::test]
async fn fail_strategy_reports_version_conflict() {
    let resolver = Resolver::new(repo(&[("lib:foo", "1.0", &[]), ("lib:foo", "2.0", &[])]))
        .with_options(ResolverOptions {
            strategy: ConflictStrategy::Fail,
            ..ResolverOptions::default()
        });
    let graph = resolve(&resolver, &app(r#""lib:foo:1.0", "lib:foo:2.0""#)).await;
    assert_eq!(kinds(&graph), vec!["version-conflict"]);
}

#[tokio::test]
async fn runtime_usage_selects_runtime_variant() {
    let fixture = RepositoryFixture::new().with(
        ComponentMetadata::new(ModuleId::new("org.example", "lib"), "1.0")
            .with_variant(trellis_core::component::Variant::new(
                "api",
                AttributeSet::new().with("usage", "api"),
            ))
            .with_variant(trellis_core::component::Variant::new(
                "runtime",
                AttributeSet::new().with("usage", "runtime"),
            )),
    );
    let resolver = Resolver::new(fixture);
    let graph = resolve(&resolver, &app(r#""org.example:lib:1.0""#)).await;
    let lib = graph.find(&ModuleId::new("org.example", "lib")).unwrap();
    assert_eq!(lib.selected_variant().unwrap().name, "runtime");
}

#[tokio::test]
async fn unmatched_usage_is_no_compatible_variant() {
    let resolver = Resolver::new(repo(&[("org.example:lib", "1.0", &[])]));
    let project = app(r#"{ module = "org.example:lib", version = "1.0", attributes = { usage = "link" } }"#);
    let graph = resolve(&resolver, &project).await;
    assert_eq!(kinds(&graph), vec!["no-compatible-variant"]);
    assert!(graph.find(&ModuleId::new("org.example", "lib")).is_none());
}

#[tokio::test]
async fn compatibility_rule_from_schema_applies() {
    let resolver = Resolver::new(repo(&[("org.example:lib", "1.0", &[])])).with_schema({
        let mut schema = AttributesSchema::new();
        schema.add_compatibility("usage", "link", "runtime");
        schema
    });
    let project = app(r#"{ module = "org.example:lib", version = "1.0", attributes = { usage = "link" } }"#);
    let graph = resolve(&resolver, &project).await;
    assert!(graph.is_success());
}

#[tokio::test]
async fn mutual_dependency_is_a_cycle() {
    let resolver = Resolver::new(repo(&[
        ("test:A", "1.0", &["test:B:1.0"]),
        ("test:B", "1.0", &["test:A:1.0"]),
    ]));
    let graph = resolve(&resolver, &app(r#""test:A:1.0""#)).await;
    assert_eq!(graph.failures().len(), 1);
    assert_eq!(
        graph.failures()[0].failure,
        ResolutionFailure::DependencyCycle {
            path: vec!["test:A".into(), "test:B".into(), "test:A".into()]
        }
    );
    assert_eq!(graph.failures()[0].failure.to_string(), "Dependency cycle: test:A -> test:B -> test:A");
    // Both modules still resolved.
    assert_eq!(graph.components().len(), 3);
}

#[tokio::test]
async fn diamond_collapses_to_one_node() {
    let resolver = Resolver::new(repo(&[
        ("org.example:a", "1.0", &["org.example:c:1.0"]),
        ("org.example:b", "1.0", &["org.example:mid:1.0"]),
        ("org.example:mid", "1.0", &["org.example:c:1.0"]),
        ("org.example:c", "1.0", &[]),
    ]));
    let graph = resolve(&resolver, &app(r#""org.example:a:1.0", "org.example:b:1.0""#)).await;
    assert!(graph.is_success());
    let c = graph.find_key("org.example:c").unwrap();
    let into_c = graph.dependencies().iter().filter(|e| e.to() == Some(c)).count();
    assert_eq!(into_c, 2);
    let c_nodes = graph
        .components()
        .iter()
        .filter(|n| matches!(&n.id, ComponentId::Module { module, .. } if module.name == "c"))
        .count();
    assert_eq!(c_nodes, 1);
}

#[tokio::test]
async fn independent_failures_are_all_reported() {
    let resolver = Resolver::new(repo(&[("org.example:ok", "1.0", &[])]));
    let project = app(r#""org.example:missing-a:1.0", "org.example:ok:1.0", "org.example:missing-b:1.0""#);
    let graph = resolve(&resolver, &project).await;
    assert_eq!(kinds(&graph), vec!["selector-unresolvable", "selector-unresolvable"]);
    assert_eq!(version_of(&graph, "org.example:ok").as_deref(), Some("1.0"));
}

fn convergence_repo() -> RepositoryFixture {
    repo(&[
        ("org.example:a", "1.0", &["org.example:c:1.0"]),
        ("org.example:a", "2.0", &["org.example:d:1.0"]),
        ("org.example:b", "1.0", &["org.example:a:2.0"]),
        ("org.example:c", "1.0", &[]),
        ("org.example:d", "1.0", &[]),
    ])
}

#[tokio::test]
async fn deeper_upgrade_retraverses_until_stable() {
    let resolver = Resolver::new(convergence_repo());
    let graph = resolve(&resolver, &app(r#""org.example:a:1.0", "org.example:b:1.0""#)).await;
    assert!(graph.is_success(), "{:?}", graph.failures());
    assert_eq!(graph.iterations(), 2);
    assert_eq!(version_of(&graph, "org.example:a").as_deref(), Some("2.0"));
    assert!(graph.find(&ModuleId::new("org.example", "d")).is_some());
    assert!(graph.find(&ModuleId::new("org.example", "c")).is_none());
    assert!(graph.print_tree(None).contains("org.example:a:1.0 -> 2.0 [runtime]"));
}

#[tokio::test]
async fn iteration_limit_reports_non_convergence() {
    let resolver = Resolver::new(convergence_repo()).with_options(ResolverOptions {
        max_iterations: 1,
        ..ResolverOptions::default()
    });
    let graph = resolve(&resolver, &app(r#""org.example:a:1.0", "org.example:b:1.0""#)).await;
    assert_eq!(kinds(&graph), vec!["did-not-converge"]);
}

#[tokio::test]
async fn resolution_is_deterministic() {
    let project = app(r#""org.example:b:1.0", "org.example:a:1.0", { files = ["libs/x.jar"] }"#);
    let first = resolve(&Resolver::new(convergence_repo()), &project).await;
    let second = resolve(&Resolver::new(convergence_repo()), &project).await;
    assert_eq!(first.print_tree(None), second.print_tree(None));
    assert_eq!(
        serde_json::to_string(&first.report()).unwrap(),
        serde_json::to_string(&second.report()).unwrap()
    );
    assert_eq!(first.to_lockfile(), second.to_lockfile());
}

#[tokio::test]
async fn rematching_a_resolved_graph_picks_the_same_variants() {
    let resolver = Resolver::new(convergence_repo());
    let graph = resolve(&resolver, &app(r#""org.example:a:1.0", "org.example:b:1.0""#)).await;
    let requested = AttributeSet::new().with("usage", "runtime");
    for component in graph.components() {
        if let ComponentId::Module { module, version } = &component.id {
            let metadata = resolver.cache().metadata(module, version).unwrap();
            let again = select_variant(
                &component.id.to_string(),
                &metadata.variants,
                &requested,
                &AttributesSchema::new(),
            )
            .unwrap();
            assert_eq!(Some(again), component.selected_variant());
        }
    }
}

#[tokio::test]
async fn forced_version_from_manifest_wins() {
    let manifest = manifest(
        r#""org.example:a:2.0""#,
        r#"
[resolution.force]
"org.example:a" = "1.0"
"#,
    );
    let options =
        ResolverOptions::from_manifest(&manifest, &Default::default()).unwrap();
    let project = manifest.into_project(&NotationRegistry::default()).unwrap();
    let resolver = Resolver::new(convergence_repo()).with_options(options);
    let graph = resolve(&resolver, &project).await;
    assert!(graph.is_success(), "{:?}", graph.failures());
    assert_eq!(version_of(&graph, "org.example:a").as_deref(), Some("1.0"));
    let a = graph.find(&ModuleId::new("org.example", "a")).unwrap();
    assert_eq!(a.reason.as_deref(), Some("forced"));
}

#[tokio::test]
async fn conflicting_forces_fail() {
    let resolver = Resolver::new(convergence_repo()).with_options(ResolverOptions {
        forced: vec![(ModuleId::new("org.example", "a"), "1.0".into())],
        ..ResolverOptions::default()
    });
    let graph = resolve(&resolver, &app(r#""org.example:a:2.0!!""#)).await;
    assert_eq!(kinds(&graph), vec!["strict-version-conflict"]);
    let explained = graph.failures()[0].explain();
    assert!(explained.contains("resolution strategy"));
    assert!(explained.contains("declared in implementation"));
}

#[tokio::test]
async fn lockfile_pins_versions() {
    let lockfile = Lockfile::from_str(
        r#"
[[configuration]]
name = "runtimeClasspath"

[[configuration.package]]
group = "lib"
name = "foo"
version = "1.0"
"#,
    )
    .unwrap();
    let fixture = repo(&[("lib:foo", "1.0", &[]), ("lib:foo", "2.0", &[])]);
    let resolver = Resolver::new(fixture)
        .with_options(ResolverOptions::default().with_lockfile(lockfile));

    let pinned = resolve(&resolver, &app(r#""lib:foo:[1.0,3.0)""#)).await;
    assert_eq!(version_of(&pinned, "lib:foo").as_deref(), Some("1.0"));

    let bumped = resolve(&resolver, &app(r#""lib:foo:2.0""#)).await;
    assert_eq!(kinds(&bumped), vec!["no-compatible-version"]);
}

#[tokio::test]
async fn transitive_failure_carries_provenance() {
    let resolver = Resolver::new(repo(&[(
        "org.example:a",
        "1.0",
        &["org.example:gone:[1.0,2.0)"],
    )]));
    let graph = resolve(&resolver, &app(r#""org.example:a:1.0""#)).await;
    let failure = &graph.failures()[0];
    let provenance = failure.provenance.as_ref().unwrap();
    assert_eq!(provenance.configuration, "runtimeClasspath");
    assert_eq!(provenance.declared_in, "org.example:a:1.0 [runtime]");
    assert_eq!(provenance.path, vec!["org.example:a:1.0"]);
    assert_eq!(provenance.dependency, "org.example:gone:[1.0,2.0)");
    assert!(failure.explain().contains("org.example:gone not found"));
}

#[tokio::test]
async fn conflicting_attribute_requests_fail_the_component() {
    let resolver = Resolver::new(repo(&[("org.example:lib", "1.0", &[])]));
    let project = app(
        r#"{ module = "org.example:lib", version = "1.0", attributes = { classifier = "a" } },
           { module = "org.example:lib", version = "1.0", attributes = { classifier = "b" } }"#,
    );
    let graph = resolve(&resolver, &project).await;
    assert_eq!(
        graph.failures()[0].failure,
        ResolutionFailure::ConflictingAttributeRequest {
            component: "org.example:lib".into(),
            attribute: "classifier".into(),
            values: vec!["a".into(), "b".into()],
        }
    );
}

const LIB: &str = r#"
[project]
name = "lib"
group = "com.example"
version = "1.0"
path = ":lib"

[configurations.api]
role = "bucket"
dependencies = ["org.example:c:1.0"]

[configurations.apiElements]
role = "consumable"
extends-from = ["api"]
attributes = { usage = "api" }
artifacts = ["build/lib-api.jar"]

[configurations.runtimeElements]
role = "consumable"
extends-from = ["api"]
attributes = { usage = "runtime" }
artifacts = ["build/lib.jar"]
"#;

fn projects() -> ProjectRegistry {
    let mut registry = ProjectRegistry::new();
    registry.insert(
        Manifest::from_str(LIB)
            .unwrap()
            .into_project(&NotationRegistry::default())
            .unwrap(),
    );
    registry
}

#[tokio::test]
async fn project_and_file_dependencies_resolve() {
    let resolver = Resolver::new(convergence_repo()).with_projects(projects());
    let project = app(r#"{ files = ["libs/local.jar"] }, { project = ":lib" }"#);
    let graph = resolve(&resolver, &project).await;
    assert!(graph.is_success(), "{:?}", graph.failures());
    let artifacts: Vec<&str> = graph.artifacts().iter().map(|a| a.name()).collect();
    assert_eq!(artifacts, vec!["local.jar", "lib.jar", "c-1.0.jar"]);
    assert_eq!(graph.to_lockfile().package.len(), 1);
}

#[tokio::test]
async fn explicit_project_configuration_must_be_consumable() {
    let resolver = Resolver::new(convergence_repo()).with_projects(projects());
    let graph = resolve(&resolver, &app(r#"{ project = ":lib", configuration = "api" }"#)).await;
    assert_eq!(kinds(&graph), vec!["illegal-role-operation"]);

    let unknown = resolve(&resolver, &app(r#"{ project = ":nowhere" }"#)).await;
    assert_eq!(kinds(&unknown), vec!["selector-unresolvable"]);
}

#[tokio::test]
async fn unknown_configuration_failure_names_project_and_configuration() {
    let resolver = Resolver::new(convergence_repo()).with_projects(projects());
    let graph = resolve(&resolver, &app(r#"{ project = ":lib", configuration = "nope" }"#)).await;
    assert_eq!(kinds(&graph), vec!["selector-unresolvable"]);
    let message = graph.failures()[0].failure.to_string();
    assert!(message.contains("configuration nope of project :lib"), "{message}");

    let missing = resolver
        .resolve_configuration(&app(r#""org.example:c:1.0""#), "nope")
        .await;
    assert_eq!(kinds(&missing), vec!["selector-unresolvable"]);
    let message = missing.failures()[0].failure.to_string();
    assert!(message.contains("configuration nope of project :app"), "{message}");
}

#[tokio::test]
async fn bucket_cannot_be_resolved() {
    let resolver = Resolver::new(convergence_repo());
    let graph = resolver
        .resolve_configuration(&app(r#""org.example:c:1.0""#), "implementation")
        .await;
    assert_eq!(kinds(&graph), vec!["illegal-role-operation"]);
    assert_eq!(graph.components().len(), 1);
}

#[tokio::test]
async fn resolve_all_isolates_configurations() {
    let manifest = manifest(
        r#""org.example:c:1.0""#,
        r#"
[configurations.brokenClasspath]
role = "resolvable"
dependencies = ["org.example:nowhere:1.0"]
"#,
    );
    let project = manifest.into_project(&NotationRegistry::default()).unwrap();
    let graphs = Resolver::new(convergence_repo()).resolve_all(&project).await;
    assert_eq!(graphs.len(), 2);
    assert!(graphs["runtimeClasspath"].is_success());
    assert_eq!(kinds(&graphs["brokenClasspath"]), vec!["selector-unresolvable"]);
}

#[tokio::test]
async fn cancelled_before_start_returns_root_only() {
    let flag = CancellationFlag::new();
    flag.cancel();
    let resolver = Resolver::new(convergence_repo()).with_cancellation(flag);
    let graph = resolve(&resolver, &app(r#""org.example:a:1.0""#)).await;
    assert_eq!(kinds(&graph), vec!["cancelled"]);
    assert_eq!(graph.components().len(), 1);
}

/// Cancels the shared flag when metadata of the module named `on` is
/// fetched.
struct CancellingSource {
    inner: RepositoryFixture,
    flag: CancellationFlag,
    on: &'static str,
}

impl MetadataSource for CancellingSource {
    fn list_versions(&self, module: &ModuleId) -> Result<Vec<String>, SourceError> {
        self.inner.list_versions(module)
    }

    fn fetch_metadata(&self, module: &ModuleId, version: &str) -> Result<ComponentMetadata, SourceError> {
        if module.name == self.on {
            self.flag.cancel();
        }
        self.inner.fetch_metadata(module, version)
    }
}

#[tokio::test]
async fn cancellation_mid_traversal_keeps_partial_graph() {
    let flag = CancellationFlag::new();
    let source = CancellingSource {
        inner: convergence_repo(),
        flag: flag.clone(),
        on: "a",
    };
    let resolver = Resolver::new(source).with_cancellation(flag);
    let graph = resolve(&resolver, &app(r#""org.example:b:1.0""#)).await;
    assert_eq!(kinds(&graph), vec!["cancelled"]);
    assert!(graph.find(&ModuleId::new("org.example", "b")).is_some());
    assert!(graph.find(&ModuleId::new("org.example", "a")).is_none());
}

#[tokio::test]
async fn cancellation_stops_the_level_being_visited() {
    let flag = CancellationFlag::new();
    let source = CancellingSource {
        inner: convergence_repo(),
        flag: flag.clone(),
        on: "c",
    };
    let resolver = Resolver::new(source).with_cancellation(flag);
    let graph = resolve(&resolver, &app(r#""org.example:b:1.0", "org.example:c:1.0""#)).await;
    assert_eq!(kinds(&graph), vec!["cancelled"]);
    assert_eq!(graph.components().len(), 1);
}

struct SlowSource;

impl MetadataSource for SlowSource {
    fn list_versions(&self, _module: &ModuleId) -> Result<Vec<String>, SourceError> {
        Ok(vec!["1.0".into()])
    }

    fn fetch_metadata(&self, module: &ModuleId, version: &str) -> Result<ComponentMetadata, SourceError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(ComponentMetadata::new(module.clone(), version))
    }
}

#[tokio::test]
async fn collaborator_timeout_is_selector_unresolvable() {
    let cache = MetadataCache::new(Arc::new(SlowSource)).with_fetch_timeout(Duration::from_millis(20));
    let resolver = Resolver::with_cache(Arc::new(cache));
    let graph = resolve(&resolver, &app(r#""org.example:slow:1.0""#)).await;
    assert_eq!(kinds(&graph), vec!["selector-unresolvable"]);
    assert!(graph.failures()[0].failure.to_string().contains("timed out"));
}

#[tokio::test]
async fn repository_loads_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("repo.toml");
    std::fs::write(
        &path,
        r#"
[[component]]
module = "org.example:lib"
version = "1.0"

[[component.variant]]
name = "runtime"
attributes = { usage = "runtime" }
artifacts = ["lib-1.0.jar"]
"#,
    )
    .unwrap();
    let fixture = RepositoryFixture::from_path(&path, &NotationRegistry::default()).unwrap();
    let graph = resolve(&Resolver::new(fixture), &app(r#""org.example:lib:1.0""#)).await;
    let artifacts: Vec<&str> = graph.artifacts().iter().map(|a| a.name()).collect();
    assert_eq!(artifacts, vec!["lib-1.0.jar"]);
}

/// Never answers a version listing of `org.example:m` in time.
struct SlowListingSource {
    inner: RepositoryFixture,
}

impl MetadataSource for SlowListingSource {
    fn list_versions(&self, module: &ModuleId) -> Result<Vec<String>, SourceError> {
        if module.name == "m" {
            std::thread::sleep(Duration::from_secs(2));
        }
        self.inner.list_versions(module)
    }

    fn fetch_metadata(&self, module: &ModuleId, version: &str) -> Result<ComponentMetadata, SourceError> {
        self.inner.fetch_metadata(module, version)
    }
}

#[tokio::test]
async fn listing_needed_after_a_plain_version_still_times_out() {
    let source = SlowListingSource {
        inner: repo(&[
            ("org.example:m", "1.0", &[]),
            ("org.example:m", "1.5", &[]),
            ("org.example:b", "1.0", &["org.example:m:[1.0,2.0)"]),
        ]),
    };
    let cache = MetadataCache::new(Arc::new(source)).with_fetch_timeout(Duration::from_millis(50));
    let resolver = Resolver::with_cache(Arc::new(cache));

    let started = Instant::now();
    let graph = resolve(&resolver, &app(r#""org.example:m:1.0", "org.example:b:1.0""#)).await;
    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());

    assert!(!kinds(&graph).is_empty());
    assert!(kinds(&graph).iter().all(|k| *k == "selector-unresolvable"));
    assert!(graph.failures()[0].failure.to_string().contains("timed out"));
}

/// Slow on the first metadata request only.
struct SlowFirstFetchSource {
    inner: RepositoryFixture,
    calls: AtomicUsize,
}

impl MetadataSource for SlowFirstFetchSource {
    fn list_versions(&self, module: &ModuleId) -> Result<Vec<String>, SourceError> {
        self.inner.list_versions(module)
    }

    fn fetch_metadata(&self, module: &ModuleId, version: &str) -> Result<ComponentMetadata, SourceError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(500));
        }
        self.inner.fetch_metadata(module, version)
    }
}

#[tokio::test]
async fn timeout_does_not_outlive_its_resolution() {
    let source = Arc::new(SlowFirstFetchSource {
        inner: convergence_repo(),
        calls: AtomicUsize::new(0),
    });
    let cache = MetadataCache::new(source.clone()).with_fetch_timeout(Duration::from_millis(20));
    let resolver = Resolver::with_cache(Arc::new(cache));
    let project = app(r#""org.example:c:1.0""#);

    let first = resolve(&resolver, &project).await;
    assert_eq!(kinds(&first), vec!["selector-unresolvable"]);

    let second = resolve(&resolver, &project).await;
    assert!(second.is_success(), "{:?}", second.failures());
    assert_eq!(version_of(&second, "org.example:c").as_deref(), Some("1.0"));
}
