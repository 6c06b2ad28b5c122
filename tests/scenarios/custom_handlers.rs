//! Test: custom action types dispatched through the registry

use crate::helpers::*;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use stepforge::core::StepOutcome;
use stepforge::execution::SchedulingStrategy;
use stepforge::recipe::{CustomHandler, CustomRegistry, RecipeContext};

/// Records the parameters and environment it was called with
#[derive(Clone, Default)]
struct Notifier {
    calls: Arc<Mutex<Vec<(BTreeMap<String, String>, Option<String>)>>>,
}

#[async_trait]
impl CustomHandler for Notifier {
    async fn handle(
        &self,
        parameters: &BTreeMap<String, String>,
        ctx: &mut RecipeContext,
    ) -> anyhow::Result<()> {
        if parameters.get("channel").map(String::as_str) == Some("nowhere") {
            anyhow::bail!("unknown channel");
        }
        self.calls
            .lock()
            .unwrap()
            .push((parameters.clone(), ctx.env.get("BUILD_ID").map(String::from)));
        Ok(())
    }
}

const NOTIFY: &str = r#"
name: "Notify"
env:
  BUILD_ID: "42"
steps:
  - id: ping
    action: { type: custom, type_name: notify, parameters: { channel: builds, level: info } }
  - id: broken
    action: { type: custom, type_name: notify, parameters: { channel: nowhere } }
  - id: after-broken
    depends_on: [broken]
    action: { type: shell, command: "true" }
  - id: unknown
    action: { type: custom, type_name: "no-such-handler" }
"#;

#[tokio::test]
async fn test_registered_handler_receives_parameters_and_env() {
    let notifier = Notifier::default();
    let registry = CustomRegistry::new().with_handler("notify", notifier.clone());

    let workspace = Workspace::new();
    let output = run_in(
        &workspace,
        &compile_yaml(NOTIFY),
        SchedulingStrategy::Sequential,
        registry,
    )
    .await;

    assert_outcome(&output.report, "ping", StepOutcome::Success);
    let calls = notifier.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.get("level").map(String::as_str), Some("info"));
    assert_eq!(calls[0].1.as_deref(), Some("42"));
}

#[tokio::test]
async fn test_handler_errors_fail_their_step() {
    let registry = CustomRegistry::new().with_handler("notify", Notifier::default());

    let workspace = Workspace::new();
    let output = run_in(
        &workspace,
        &compile_yaml(NOTIFY),
        SchedulingStrategy::Parallel,
        registry,
    )
    .await;
    let report = &output.report;

    assert_outcome(report, "broken", StepOutcome::Failed);
    assert_outcome(report, "after-broken", StepOutcome::Skipped);
    assert!(report
        .result("broken")
        .unwrap()
        .detail
        .as_deref()
        .unwrap()
        .contains("unknown channel"));

    assert_outcome(report, "unknown", StepOutcome::Failed);
    assert!(report
        .result("unknown")
        .unwrap()
        .detail
        .as_deref()
        .unwrap()
        .contains("no handler registered"));
}
