use trellis_core::configuration::{ConfigurationRole, RoleMigration};
use trellis_core::manifest::{ConflictStrategy, Manifest};
use trellis_core::notation::NotationRegistry;

const APP: &str = r#"
[project]
name = "app"
group = "org.example"
version = "1.0"
path = ":app"

[configurations.implementation]
role = "bucket"
dependencies = [
    "org.example:lib:1.0",
    { project = ":core" },
    { files = ["libs/local.jar"] },
]

[configurations.runtimeClasspath]
role = "resolvable"
extends-from = ["implementation"]
attributes = { usage = "runtime" }

[configurations.archives]
role = "consumable-to-retired"
locked = true

[schema]
precedence = ["usage"]

[schema.attributes.usage.compatible]
runtime = ["api"]

[resolution]
strategy = "fail"
max-iterations = 10

[resolution.force]
"org.example:lib" = "1.2"
"#;

#[test]
fn parses_all_sections() {
    let manifest = Manifest::from_str(APP).unwrap();
    assert_eq!(manifest.project.name, "app");
    assert_eq!(manifest.configurations.len(), 3);
    assert_eq!(
        manifest.configurations["archives"].role,
        ConfigurationRole::Migrating(RoleMigration::ConsumableToRetired)
    );
    assert!(manifest.schema.has_rule("usage", "runtime", "api"));
    assert_eq!(manifest.resolution.strategy, ConflictStrategy::Fail);
    assert_eq!(manifest.resolution.max_iterations, 10);
    assert_eq!(manifest.resolution.max_concurrent_fetches, 8);
    let forced = manifest.resolution.forced_modules().unwrap();
    assert_eq!(forced[0].0.to_string(), "org.example:lib");
    assert_eq!(forced[0].1, "1.2");
}

#[test]
fn builds_project_with_closure() {
    let manifest = Manifest::from_str(APP).unwrap();
    let project = manifest.into_project(&NotationRegistry::default()).unwrap();
    assert_eq!(project.path(), ":app");
    assert_eq!(project.resolvable_configurations(), vec!["runtimeClasspath"]);

    let request = project.resolution_request("runtimeClasspath").unwrap();
    assert_eq!(request.attributes.get("usage"), Some("runtime"));
    assert_eq!(request.dependencies.len(), 3);
    assert!(request
        .dependencies
        .iter()
        .all(|d| d.configuration == "implementation"));

    assert!(project.configurations.get("archives").unwrap().is_locked());
}

#[test]
fn unsupported_notation_is_a_notation_error() {
    let manifest = Manifest::from_str(
        r#"
[project]
name = "app"
group = "org.example"
version = "1.0"

[configurations.implementation]
role = "bucket"
dependencies = [{ coordinates = "x" }]
"#,
    )
    .unwrap();
    let err = manifest
        .into_project(&NotationRegistry::default())
        .unwrap_err();
    assert!(err.to_string().contains("Invalid dependency notation"));
}

#[test]
fn extends_cycle_is_a_configuration_error() {
    let manifest = Manifest::from_str(
        r#"
[project]
name = "app"
group = "org.example"
version = "1.0"

[configurations.a]
role = "bucket"
extends-from = ["b"]

[configurations.b]
role = "bucket"
extends-from = ["a"]
"#,
    )
    .unwrap();
    let err = manifest
        .into_project(&NotationRegistry::default())
        .unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn invalid_role_fails_to_parse() {
    let result = Manifest::from_str(
        r#"
[project]
name = "app"
group = "org.example"
version = "1.0"

[configurations.a]
role = "frozen"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn loads_sibling_projects() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("core")).unwrap();
    std::fs::write(
        dir.path().join("core/Trellis.toml"),
        r#"
[project]
name = "core"
group = "org.example"
version = "1.0"

[configurations.apiElements]
role = "consumable"
attributes = { usage = "api" }
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("Trellis.toml"),
        r#"
[project]
name = "app"
group = "org.example"
version = "1.0"

[projects]
":core" = "core/Trellis.toml"
"#,
    )
    .unwrap();

    let manifest = Manifest::from_path(&dir.path().join("Trellis.toml")).unwrap();
    let registry = manifest
        .load_projects(dir.path(), &NotationRegistry::default())
        .unwrap();
    let core = registry.get(":core").unwrap();
    assert_eq!(core.variants().unwrap()[0].name, "apiElements");
}
