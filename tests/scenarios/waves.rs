//! Test: wave planning and the barrier between waves

use crate::helpers::*;
use stepforge::core::StepOutcome;
use stepforge::execution::{ExecutionEvent, SchedulingStrategy};
use stepforge::recipe::CustomRegistry;

/// A linear chain becomes one wave per step
#[tokio::test]
async fn test_linear_chain_runs_one_step_per_wave() {
    let yaml = r#"
name: "Chain"
steps:
  - id: checkout
    action: { type: shell, command: "echo checkout > order.txt" }
  - id: build
    depends_on: [checkout]
    action: { type: shell, command: "echo build >> order.txt" }
  - id: test
    depends_on: [build]
    action: { type: shell, command: "echo test >> order.txt" }
"#;

    let compiled = compile_yaml(yaml);
    assert_eq!(
        compiled.plan().waves(),
        waves(&[&["checkout"], &["build"], &["test"]]).as_slice()
    );

    let workspace = Workspace::new();
    let output = run_yaml(&workspace, yaml).await;

    assert!(output.report.is_success());
    assert_eq!(workspace.read("order.txt"), "checkout\nbuild\ntest\n");
    assert_eq!(
        announced_waves(&output.events),
        waves(&[&["checkout"], &["build"], &["test"]])
    );
}

/// Independent steps share a wave; the join step waits for both
#[tokio::test]
async fn test_fan_in_waits_for_whole_wave() {
    let yaml = r#"
name: "Fan in"
steps:
  - id: a
    action: { type: shell, command: "sleep 0.2 && touch a.done" }
  - id: b
    action: { type: shell, command: "touch b.done" }
  - id: c
    depends_on: [a, b]
    action: { type: shell, command: "test -f a.done && test -f b.done" }
"#;

    let compiled = compile_yaml(yaml);
    assert_eq!(compiled.plan().waves(), waves(&[&["a", "b"], &["c"]]).as_slice());

    let workspace = Workspace::new();
    let output = run_yaml(&workspace, yaml).await;

    assert_outcome(&output.report, "c", StepOutcome::Success);

    // Both wave-0 steps finish before c is dispatched
    let position = |wanted: &dyn Fn(&ExecutionEvent) -> bool| {
        output.events.iter().position(|e| wanted(e)).unwrap()
    };
    let c_started = position(&|e| matches!(e, ExecutionEvent::StepStarted { step_id } if step_id == "c"));
    let a_done = position(&|e| matches!(e, ExecutionEvent::StepSucceeded { step_id, .. } if step_id == "a"));
    let b_done = position(&|e| matches!(e, ExecutionEvent::StepSucceeded { step_id, .. } if step_id == "b"));
    assert!(a_done < c_started && b_done < c_started);
}

/// Results come back in plan order regardless of completion order
#[tokio::test]
async fn test_report_follows_plan_order() {
    let yaml = r#"
name: "Order"
steps:
  - id: slow
    action: { type: shell, command: "sleep 0.2" }
  - id: fast
    action: { type: shell, command: "true" }
  - id: last
    depends_on: [fast]
    action: { type: shell, command: "true" }
"#;

    let workspace = Workspace::new();
    let output = run_yaml(&workspace, yaml).await;

    let ids: Vec<&str> = output.report.results.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(ids, vec!["slow", "fast", "last"]);
}

/// Sequential scheduling still respects declaration order within a wave
#[tokio::test]
async fn test_sequential_strategy_runs_wave_members_one_at_a_time() {
    let yaml = r#"
name: "Sequential"
steps:
  - id: first
    action: { type: shell, command: "sleep 0.1 && echo first >> log.txt" }
  - id: second
    action: { type: shell, command: "echo second >> log.txt" }
"#;

    let workspace = Workspace::new();
    let output = run_in(
        &workspace,
        &compile_yaml(yaml),
        SchedulingStrategy::Sequential,
        CustomRegistry::new(),
    )
    .await;

    assert!(output.report.is_success());
    assert_eq!(workspace.read("log.txt"), "first\nsecond\n");
}
