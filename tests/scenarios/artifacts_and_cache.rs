//! Test: artifact copies and cache save/restore inside a workspace

use crate::helpers::*;
use stepforge::core::StepOutcome;

#[tokio::test]
async fn test_artifact_copies_build_output_tree() {
    let yaml = r#"
name: "Publish"
steps:
  - id: build
    action: { type: shell, command: "mkdir -p zig-out/bin && echo binary > zig-out/bin/app" }
  - id: publish
    depends_on: [build]
    action: { type: artifact, source_path: "zig-out", destination: "dist/release" }
"#;

    let workspace = Workspace::new();
    let output = run_yaml(&workspace, yaml).await;

    assert_outcome(&output.report, "publish", StepOutcome::Success);
    assert_eq!(workspace.read("dist/release/bin/app"), "binary\n");
}

#[tokio::test]
async fn test_artifact_with_missing_source_fails() {
    let yaml = r#"
name: "Publish"
steps:
  - id: publish
    action: { type: artifact, source_path: "nowhere", destination: "dist" }
"#;

    let workspace = Workspace::new();
    let output = run_yaml(&workspace, yaml).await;

    assert_outcome(&output.report, "publish", StepOutcome::Failed);
    assert!(output
        .report
        .result("publish")
        .unwrap()
        .detail
        .as_deref()
        .unwrap()
        .contains("filesystem error"));
}

#[tokio::test]
async fn test_cache_round_trip_between_runs() {
    let save = r#"
name: "Warm"
steps:
  - id: deps
    action: { type: shell, command: "mkdir -p .deps && echo lockfile > .deps/pkg" }
  - id: save
    depends_on: [deps]
    action: { type: cache, action: save, key: deps-v1, paths: ".deps, not-there", cache_dir: ".cache" }
"#;
    let restore = r#"
name: "Cold"
steps:
  - id: restore
    action: { type: cache, action: restore, key: deps-v1, cache_dir: ".cache" }
  - id: use
    depends_on: [restore]
    action: { type: shell, command: "cat .deps/pkg" }
"#;

    let workspace = Workspace::new();
    let warm = run_yaml(&workspace, save).await;
    assert!(warm.report.is_success());
    assert!(workspace.join(".cache/deps-v1.tar.gz").is_file());

    std::fs::remove_dir_all(workspace.join(".deps")).unwrap();

    let cold = run_yaml(&workspace, restore).await;
    assert_outcome(&cold.report, "use", StepOutcome::Success);
    assert_eq!(cold.report.result("use").unwrap().stdout, "lockfile\n");
}

#[tokio::test]
async fn test_cache_miss_is_not_a_failure() {
    let yaml = r#"
name: "Miss"
steps:
  - id: restore
    action: { type: cache, action: restore, key: never-saved, cache_dir: ".cache" }
"#;

    let workspace = Workspace::new();
    let output = run_yaml(&workspace, yaml).await;

    assert_outcome(&output.report, "restore", StepOutcome::Success);
}

#[tokio::test]
async fn test_cache_key_with_separator_is_rejected() {
    let yaml = r#"
name: "Bad key"
steps:
  - id: save
    action: { type: cache, action: save, key: "../escape", paths: "src", cache_dir: ".cache" }
"#;

    let workspace = Workspace::new();
    let output = run_yaml(&workspace, yaml).await;

    assert_outcome(&output.report, "save", StepOutcome::Failed);
    assert!(output
        .report
        .result("save")
        .unwrap()
        .detail
        .as_deref()
        .unwrap()
        .contains("parameter 'key'"));
}
