//! End-to-end tests driving the `shamash-asm` binary as a subprocess:
//! `init`, `validate`, `scan` (with `--export-facts`), `facts`, and
//! `registry list`.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

use common::{Call, ClassBuilder};

fn bin() -> Command {
    Command::cargo_bin("shamash-asm").unwrap()
}

#[test]
fn init_writes_a_parseable_reference_config() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("shamash.toml");

    bin().args(["init", "--out"]).arg(&out).assert().success();
    assert!(out.exists());

    bin().args(["validate", "--config"]).arg(&out).assert().success().stdout(predicate::str::contains("well-formed"));
}

#[test]
fn validate_rejects_malformed_config() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "this is not valid = = toml").unwrap();

    bin().args(["validate", "--config"]).arg(&bad).assert().failure().code(2);
}

#[test]
fn registry_list_includes_shipped_rules() {
    bin()
        .args(["registry", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("arch.forbiddenRoleDependencies"))
        .stdout(predicate::str::contains("metrics.maxFanOut"));
}

#[test]
fn scan_flags_a_forbidden_dependency_and_exits_with_fail_on_error() {
    let project = tempfile::tempdir().unwrap();

    let controller = ClassBuilder::new("com/a/web/UserController")
        .calls(Call::new("com/a/repository/UserRepository", "findById", "(I)Lcom/a/domain/User;"))
        .build();
    common::write_class(project.path(), "com/a/web/UserController", &controller);
    let repository = ClassBuilder::new("com/a/repository/UserRepository").build();
    common::write_class(project.path(), "com/a/repository/UserRepository", &repository);

    let config_dir = tempfile::tempdir().unwrap();
    let config_path = config_dir.path().join("shamash.toml");
    let config = format!(
        r#"
[project.bytecode]
project_base = "{project_base}"
roots = ["."]

[roles.controller]
priority = 10
match = {{ kind = "packageContainsSegment", segment = "web" }}

[roles.repository]
priority = 10
match = {{ kind = "packageContainsSegment", segment = "repository" }}

[[rules]]
type = "arch.forbiddenRoleDependencies"
name = "noRepoAccess"
severity = "error"

[rules.params]
forbid = ["controller->repository"]
mode = "direct"
"#,
        project_base = project.path().display().to_string().replace('\\', "/"),
    );
    std::fs::write(&config_path, config).unwrap();

    bin()
        .args(["scan", "--config"])
        .arg(&config_path)
        .args(["--print-findings", "--fail-on", "error"])
        .assert()
        .failure()
        .code(4)
        .stdout(predicate::str::contains("arch.forbiddenRoleDependencies"));
}

#[test]
fn scan_export_facts_round_trips_through_the_facts_command() {
    let project = tempfile::tempdir().unwrap();
    let class = ClassBuilder::new("com/a/web/HomeController").build();
    common::write_class(project.path(), "com/a/web/HomeController", &class);

    let work_dir = tempfile::tempdir().unwrap();
    let config_path = work_dir.path().join("shamash.toml");
    let output_dir = work_dir.path().join("out");
    let config = format!(
        r#"
[project.bytecode]
project_base = "{project_base}"
roots = ["."]

[roles.controller]
priority = 10
match = {{ kind = "packageContainsSegment", segment = "web" }}

[export]
enabled = true
output_dir = "{output_dir}"
formats = []
overwrite = true
"#,
        project_base = project.path().display().to_string().replace('\\', "/"),
        output_dir = output_dir.display().to_string().replace('\\', "/"),
    );
    std::fs::write(&config_path, config).unwrap();

    bin()
        .args(["scan", "--config"])
        .arg(&config_path)
        .args(["--export-facts", "--facts-format", "jsonl-gz", "--fail-on", "none"])
        .assert()
        .success();

    let facts_path = output_dir.join("facts.jsonl.gz");
    assert!(facts_path.exists());

    bin()
        .args(["facts"])
        .arg(&facts_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("classes: 1"))
        .stdout(predicate::str::contains("role controller: 1"));
}
