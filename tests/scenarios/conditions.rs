//! Test: conditions gate steps on environment values and earlier outcomes

use crate::helpers::*;
use stepforge::core::config::PipelineConfig;
use stepforge::core::{BuildError, CompiledPipeline, Environment, StepOutcome};
use stepforge::execution::SchedulingStrategy;
use stepforge::recipe::CustomRegistry;

const RELEASE: &str = r#"
name: "Release"
env:
  DEPLOY: "no"
  CHANNEL: stable
steps:
  - id: build
    action: { type: shell, command: "touch build.done" }
  - id: deploy
    depends_on: [build]
    if: "$DEPLOY == 'yes' and build succeeded"
    action: { type: shell, command: "touch deploy.done" }
  - id: announce
    depends_on: [deploy]
    action: { type: shell, command: "touch announce.done" }
  - id: beta-notes
    depends_on: [build]
    if: "$CHANNEL != 'stable'"
    action: { type: shell, command: "touch beta.done" }
"#;

#[tokio::test]
async fn test_false_condition_skips_without_running() {
    let workspace = Workspace::new();
    let output = run_yaml(&workspace, RELEASE).await;
    let report = &output.report;

    assert_outcome(report, "deploy", StepOutcome::Skipped);
    assert_outcome(report, "beta-notes", StepOutcome::Skipped);
    assert!(!workspace.join("deploy.done").exists());
    assert_eq!(
        report.result("deploy").unwrap().detail.as_deref(),
        Some("condition evaluated to false")
    );

    // A condition skip is not a failure and does not cascade
    assert_outcome(report, "announce", StepOutcome::Success);
    assert!(report.is_success());
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_overridden_variable_enables_step() {
    let mut pipeline = PipelineConfig::from_yaml(RELEASE).unwrap().to_pipeline();
    let overrides: Environment = [("DEPLOY", "yes")].into_iter().collect();
    pipeline.env = pipeline.env.merged_with(&overrides);
    let compiled = CompiledPipeline::compile(pipeline).unwrap();

    let workspace = Workspace::new();
    let output = run_in(
        &workspace,
        &compiled,
        SchedulingStrategy::Parallel,
        CustomRegistry::new(),
    )
    .await;

    assert_outcome(&output.report, "deploy", StepOutcome::Success);
    assert!(workspace.join("deploy.done").exists());
}

#[tokio::test]
async fn test_step_env_overrides_global_for_condition_and_process() {
    let yaml = r#"
name: "Scoped env"
env:
  TARGET: linux
steps:
  - id: cross
    env:
      TARGET: windows
    if: "$TARGET == 'windows'"
    action: { type: shell, command: "echo $TARGET > target.txt" }
  - id: native
    if: "$TARGET == 'windows'"
    action: { type: shell, command: "true" }
"#;

    let workspace = Workspace::new();
    let output = run_yaml(&workspace, yaml).await;

    assert_outcome(&output.report, "cross", StepOutcome::Success);
    assert_outcome(&output.report, "native", StepOutcome::Skipped);
    assert_eq!(workspace.read("target.txt"), "windows\n");
}

#[tokio::test]
async fn test_condition_on_failed_step_runs_cleanup() {
    let yaml = r#"
name: "Cleanup"
steps:
  - id: integration
    action: { type: shell, command: "exit 1" }
  - id: notify
    action: { type: shell, command: "sleep 0.1" }
  - id: report-failure
    depends_on: [notify]
    if: "integration failed"
    action: { type: shell, command: "touch reported" }
"#;

    let workspace = Workspace::new();
    let output = run_yaml(&workspace, yaml).await;

    assert_outcome(&output.report, "report-failure", StepOutcome::Success);
    assert!(workspace.join("reported").exists());
    assert_eq!(output.report.exit_code(), 1);
}

#[test]
fn test_undefined_variable_is_a_build_error() {
    let yaml = r#"
name: "Bad"
steps:
  - id: deploy
    if: "$MISSING == 'x'"
    action: { type: shell, command: "true" }
"#;

    let pipeline = PipelineConfig::from_yaml(yaml).unwrap().to_pipeline();
    let err = CompiledPipeline::compile(pipeline).unwrap_err();
    assert!(matches!(err, BuildError::Condition(_)));
    assert!(err.to_string().contains("MISSING"));
}
