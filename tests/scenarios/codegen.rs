//! Test: generating standalone programs from definitions

use crate::helpers::*;
use stepforge::codegen::{generate, run_generation};
use std::process::Command;

const CI: &str = r#"
name: "CI Nightly"
env:
  PROFILE: release
steps:
  - id: build
    action: { type: shell, command: "echo built > build.log" }
  - id: test
    depends_on: [build]
    action: { type: shell, command: "exit 7" }
  - id: publish
    depends_on: [test]
    action: { type: artifact, source_path: build.log, destination: dist/build.log }
  - id: notes
    depends_on: [build]
    action: { type: shell, command: "true" }
  - id: report
    depends_on: [notes]
    if: "test failed or $PROFILE == 'debug'"
    action: { type: shell, command: "echo report > report.txt" }
"#;

#[test]
fn test_generated_program_covers_every_step() {
    let program = generate(&compile_yaml(CI)).unwrap();
    let main = program.main_rs().unwrap();

    assert_eq!(program.package_name, "ci-nightly");
    for id in ["build", "test", "notes", "publish", "report"] {
        assert!(main.contains(&format!("id: \"{}\"", id)), "missing step {}", id);
    }
    assert!(!main.contains("{{"));
    assert!(program.cargo_toml().unwrap().contains("name = \"ci-nightly\""));
}

#[test]
fn test_same_definition_generates_identical_files() {
    let first = generate(&compile_yaml(CI)).unwrap();
    let second = generate(&compile_yaml(CI)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_cyclic_definition_writes_nothing() {
    let workspace = Workspace::new();
    let definition = workspace.write(
        "cycle.yaml",
        r#"
name: "Cycle"
steps:
  - id: a
    depends_on: [b]
    action: { type: shell, command: "true" }
  - id: b
    depends_on: [a]
    action: { type: shell, command: "true" }
"#,
    );
    let out = workspace.join("generated");

    let mut log = Vec::new();
    let err = run_generation(&definition, &out, &mut log).unwrap_err();

    assert!(format!("{:#}", err).contains("cyclic dependency"));
    assert!(!out.exists());
}

/// Builds the generated package with cargo and runs it against a scratch directory
#[test]
#[ignore] // Requires cargo and a few seconds of compile time
fn test_generated_program_runs_like_the_engine() {
    let workspace = Workspace::new();
    let definition = workspace.write("ci.yaml", CI);
    let out = workspace.join("generated");
    run_generation(&definition, &out, &mut std::io::sink()).unwrap();

    let build = Command::new("cargo")
        .args(["build", "--quiet", "--manifest-path"])
        .arg(out.join("Cargo.toml"))
        .arg("--target-dir")
        .arg(workspace.join("target"))
        .status()
        .unwrap();
    assert!(build.success());

    let run_dir = workspace.join("run");
    std::fs::create_dir_all(&run_dir).unwrap();
    let output = Command::new(workspace.join("target/debug/ci-nightly"))
        .current_dir(&run_dir)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(run_dir.join("build.log").is_file());
    assert!(run_dir.join("report.txt").is_file());
    assert!(!run_dir.join("dist").exists());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("publish"));
}
