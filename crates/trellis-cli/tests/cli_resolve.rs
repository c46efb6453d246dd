mod common;

use common::{project, trellis_cmd};
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_resolve_without_manifest_fails() {
    let tmp = TempDir::new().unwrap();

    trellis_cmd(tmp.path())
        .args(["resolve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not find Trellis.toml"));
}

#[test]
fn test_resolve_lists_selected_components() {
    let tmp = project(r#""org.example:a:1.0", "org.example:b:1.0""#);

    trellis_cmd(tmp.path())
        .args(["resolve"])
        .assert()
        .success()
        .stdout(predicate::str::contains("runtimeClasspath:"))
        .stdout(predicate::str::contains(
            "org.example:a:2.0 [runtime] (conflict resolution: newest wins)",
        ))
        .stdout(predicate::str::contains("org.example:d:1.0 [runtime]"))
        .stdout(predicate::str::contains("org.example:c").not())
        .stderr(predicate::str::contains("org.example:a requested 1.0, 2.0 -> 2.0"));
}

#[test]
fn test_resolve_from_subdirectory() {
    let tmp = project(r#""org.example:c:1.0""#);
    let nested = tmp.path().join("src").join("main");
    std::fs::create_dir_all(&nested).unwrap();

    trellis_cmd(&nested)
        .args(["resolve", "runtimeClasspath"])
        .assert()
        .success()
        .stdout(predicate::str::contains("org.example:c:1.0 [runtime] (requested)"));
}

#[test]
fn test_resolve_json_report() {
    let tmp = project(r#""org.example:b:1.0""#);

    let output = trellis_cmd(tmp.path())
        .args(["resolve", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let report = &reports[0];
    assert_eq!(report["configuration"], "runtimeClasspath");
    assert_eq!(report["success"], true);
    let ids: Vec<String> = report["components"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| format!("{}:{}", c["id"]["module"]["name"].as_str().unwrap(), c["id"]["version"].as_str().unwrap()))
        .collect();
    assert_eq!(ids, vec!["b:1.0", "a:2.0", "d:1.0"]);
}

#[test]
fn test_resolve_reports_failures_with_provenance() {
    let tmp = project(r#""org.example:b:1.0", "org.example:missing:1.0""#);

    trellis_cmd(tmp.path())
        .args(["resolve"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("org.example:b:1.0 [runtime]"))
        .stderr(predicate::str::contains("org.example:missing:1.0 not found"))
        .stderr(predicate::str::contains("declared in implementation"))
        .stderr(predicate::str::contains("1 failure while resolving runtimeClasspath"));
}

#[test]
fn test_resolving_a_bucket_is_rejected() {
    let tmp = project(r#""org.example:c:1.0""#);

    trellis_cmd(tmp.path())
        .args(["resolve", "implementation"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot"));
}

#[test]
fn test_resolve_project_dependency() {
    let tmp = project(r#"{ project = ":lib" }"#);
    let manifest = std::fs::read_to_string(tmp.path().join("Trellis.toml")).unwrap();
    std::fs::write(
        tmp.path().join("Trellis.toml"),
        format!("{manifest}\n[projects]\n\":lib\" = \"lib/Trellis.toml\"\n"),
    )
    .unwrap();
    std::fs::create_dir_all(tmp.path().join("lib")).unwrap();
    std::fs::write(
        tmp.path().join("lib").join("Trellis.toml"),
        r#"
[project]
name = "lib"
group = "com.example"
version = "1.0"

[configurations.api]
role = "bucket"
dependencies = ["org.example:c:1.0"]

[configurations.runtimeElements]
role = "consumable"
extends-from = ["api"]
attributes = { usage = "runtime" }
artifacts = ["build/lib.jar"]
"#,
    )
    .unwrap();

    trellis_cmd(tmp.path())
        .args(["resolve"])
        .assert()
        .success()
        .stdout(predicate::str::contains("project :lib [runtimeElements]"))
        .stdout(predicate::str::contains("org.example:c:1.0 [runtime]"));
}
