use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const REPOSITORY: &str = r#"
[[component]]
module = "org.example:a"
version = "1.0"

[[component.variant]]
name = "runtime"
attributes = { usage = "runtime" }
artifacts = ["a-1.0.jar"]
dependencies = ["org.example:c:1.0"]

[[component]]
module = "org.example:a"
version = "2.0"

[[component.variant]]
name = "runtime"
attributes = { usage = "runtime" }
artifacts = ["a-2.0.jar"]
dependencies = ["org.example:d:1.0"]

[[component]]
module = "org.example:b"
version = "1.0"

[[component.variant]]
name = "runtime"
attributes = { usage = "runtime" }
artifacts = ["b-1.0.jar"]
dependencies = ["org.example:a:2.0"]

[[component]]
module = "org.example:c"
version = "1.0"

[[component.variant]]
name = "runtime"
attributes = { usage = "runtime" }
artifacts = ["c-1.0.jar"]

[[component]]
module = "org.example:d"
version = "1.0"

[[component.variant]]
name = "runtime"
attributes = { usage = "runtime" }
artifacts = ["d-1.0.jar"]
"#;

/// A project whose `implementation` bucket declares `dependencies`.
pub fn manifest(dependencies: &str) -> String {
    format!(
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

[resolution]
repository = "repo.toml"
"#
    )
}

pub fn project(dependencies: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("Trellis.toml"), manifest(dependencies)).unwrap();
    fs::write(tmp.path().join("repo.toml"), REPOSITORY).unwrap();
    tmp
}

#[allow(deprecated)]
pub fn trellis_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("trellis").unwrap();
    cmd.current_dir(dir).env("HOME", dir).env_remove("RUST_LOG");
    cmd
}
