//! Test utility functions for stepforge

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use stepforge::core::config::PipelineConfig;
use stepforge::core::{CompiledPipeline, RunReport, StepOutcome};
use stepforge::execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy};
use stepforge::recipe::{CustomRegistry, RecipeConfig};
use tempfile::TempDir;

/// Parse and compile a YAML definition, panicking on errors
pub fn compile_yaml(yaml: &str) -> CompiledPipeline {
    let config = PipelineConfig::from_yaml(yaml).expect("definition should parse");
    CompiledPipeline::compile(config.to_pipeline()).expect("pipeline should compile")
}

/// A scratch directory used as the recipe workspace
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.join(relative)).expect("read file")
    }

    pub fn config(&self) -> RecipeConfig {
        RecipeConfig::new().with_workspace(self.path())
    }
}

/// Outcome of a run plus every event the engine emitted
pub struct RunOutput {
    pub report: RunReport,
    pub events: Vec<ExecutionEvent>,
}

/// Run a compiled pipeline in `workspace` and collect events
pub async fn run_in(
    workspace: &Workspace,
    compiled: &CompiledPipeline,
    strategy: SchedulingStrategy,
    registry: CustomRegistry,
) -> RunOutput {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let engine = ExecutionEngine::with_registry(workspace.config(), strategy, registry)
        .with_event_handler(move |event| sink.lock().unwrap().push(event));

    let report = engine.execute(compiled).await;
    let events = events.lock().unwrap().clone();
    RunOutput { report, events }
}

/// Run a YAML definition in a fresh workspace with the default strategy
pub async fn run_yaml(workspace: &Workspace, yaml: &str) -> RunOutput {
    run_in(
        workspace,
        &compile_yaml(yaml),
        SchedulingStrategy::default(),
        CustomRegistry::new(),
    )
    .await
}

pub fn assert_outcome(report: &RunReport, step_id: &str, expected: StepOutcome) {
    assert_eq!(
        report.outcome(step_id),
        Some(expected),
        "step '{}' has outcome {:?}, expected {:?}",
        step_id,
        report.outcome(step_id),
        expected
    );
}

/// Order in which steps were dispatched
pub fn started_order(events: &[ExecutionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StepStarted { step_id } => Some(step_id.clone()),
            _ => None,
        })
        .collect()
}

/// Wave contents as announced by the engine
pub fn announced_waves(events: &[ExecutionEvent]) -> Vec<Vec<String>> {
    events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::WaveStarted { step_ids, .. } => Some(step_ids.clone()),
            _ => None,
        })
        .collect()
}

pub fn waves(expected: &[&[&str]]) -> Vec<Vec<String>> {
    expected
        .iter()
        .map(|wave| wave.iter().map(|s| s.to_string()).collect())
        .collect()
}
