//! Test: failure cascade - a failed step skips only its transitive dependents

use crate::helpers::*;
use stepforge::core::{ExecutionStatus, StepOutcome};
use stepforge::execution::ExecutionEvent;

const DIAMOND: &str = r#"
name: "Cascade"
steps:
  - id: lint
    action: { type: shell, command: "echo 'lint: 2 warnings' >&2; exit 3" }
  - id: fmt
    action: { type: shell, command: "sleep 0.1 && touch fmt.done" }
  - id: build
    depends_on: [lint]
    action: { type: shell, command: "touch build.done" }
  - id: package
    depends_on: [build, fmt]
    action: { type: shell, command: "touch package.done" }
  - id: docs
    depends_on: [fmt]
    action: { type: shell, command: "touch docs.done" }
"#;

#[tokio::test]
async fn test_failure_skips_transitive_dependents() {
    let workspace = Workspace::new();
    let output = run_yaml(&workspace, DIAMOND).await;
    let report = &output.report;

    assert_outcome(report, "lint", StepOutcome::Failed);
    assert_outcome(report, "build", StepOutcome::Skipped);
    assert_outcome(report, "package", StepOutcome::Skipped);
    assert!(!workspace.join("build.done").exists());
    assert!(!workspace.join("package.done").exists());

    assert_eq!(
        report.result("package").unwrap().detail.as_deref(),
        Some("dependency 'lint' failed")
    );
}

#[tokio::test]
async fn test_siblings_and_unrelated_branches_still_run() {
    let workspace = Workspace::new();
    let output = run_yaml(&workspace, DIAMOND).await;

    // fmt shares lint's wave and is not preempted
    assert_outcome(&output.report, "fmt", StepOutcome::Success);
    assert_outcome(&output.report, "docs", StepOutcome::Success);
    assert!(workspace.join("fmt.done").exists());
    assert!(workspace.join("docs.done").exists());
}

#[tokio::test]
async fn test_failed_step_reports_exit_code_and_stderr() {
    let workspace = Workspace::new();
    let output = run_yaml(&workspace, DIAMOND).await;
    let lint = output.report.result("lint").unwrap();

    assert_eq!(lint.exit_code, Some(3));
    assert!(lint.stderr.contains("lint: 2 warnings"));
    assert!(output.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StepFailed { step_id, stderr, .. }
            if step_id == "lint" && stderr.contains("2 warnings")
    )));

    assert_eq!(output.report.status, ExecutionStatus::Failed);
    assert_eq!(output.report.exit_code(), 1);
    assert_eq!(output.report.failed_steps(), vec!["lint"]);
}

#[tokio::test]
async fn test_missing_program_fails_only_its_step() {
    let yaml = r#"
name: "Missing toolchain"
steps:
  - id: build
    action: { type: compile, source_file: "src/main.zig", output_name: "app" }
  - id: notes
    action: { type: shell, command: "true" }
"#;

    let workspace = Workspace::new();
    let compiled = compile_yaml(yaml);
    let config = workspace
        .config()
        .with_toolchain("stepforge-test-no-such-toolchain");
    let engine = stepforge::ExecutionEngine::with_registry(
        config,
        Default::default(),
        stepforge::CustomRegistry::new(),
    );
    let report = engine.execute(&compiled).await;

    assert_outcome(&report, "build", StepOutcome::Failed);
    assert_outcome(&report, "notes", StepOutcome::Success);
    assert!(report
        .result("build")
        .unwrap()
        .detail
        .as_deref()
        .unwrap()
        .contains("stepforge-test-no-such-toolchain"));
}
