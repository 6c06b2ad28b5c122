//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Every step succeeded or was skipped by its condition
    Completed,
    /// At least one step failed
    Failed,
    /// Interrupted between waves
    Cancelled,
}

/// Terminal outcome of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepOutcome {
    Success,
    Failed,
    Skipped,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Success => "success",
            StepOutcome::Failed => "failed",
            StepOutcome::Skipped => "skipped",
        }
    }
}

/// Result of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub outcome: StepOutcome,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,

    /// When the recipe was dispatched (None for skipped steps)
    pub started_at: Option<DateTime<Utc>>,

    /// Exit code of the last process the recipe ran, if any
    pub exit_code: Option<i32>,

    /// Error message for failures, reason for skips
    pub detail: Option<String>,
}

impl StepResult {
    /// A step that never ran
    pub fn skipped(step_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            outcome: StepOutcome::Skipped,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
            started_at: None,
            exit_code: None,
            detail: Some(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == StepOutcome::Failed
    }
}

/// Aggregated results of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique execution ID
    pub execution_id: Uuid,

    pub pipeline_name: String,

    pub status: ExecutionStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Step results in plan order
    pub results: Vec<StepResult>,
}

impl RunReport {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            results: Vec::new(),
        }
    }

    /// Get the result of a specific step
    pub fn result(&self, step_id: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_id == step_id)
    }

    pub fn outcome(&self, step_id: &str) -> Option<StepOutcome> {
        self.result(step_id).map(|r| r.outcome)
    }

    /// True iff no step failed
    pub fn is_success(&self) -> bool {
        !self.results.iter().any(StepResult::is_failed)
    }

    /// Process exit status for this run
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.ids_with(StepOutcome::Failed)
    }

    pub fn skipped_steps(&self) -> Vec<&str> {
        self.ids_with(StepOutcome::Skipped)
    }

    pub fn succeeded_steps(&self) -> Vec<&str> {
        self.ids_with(StepOutcome::Success)
    }

    fn ids_with(&self, outcome: StepOutcome) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.outcome == outcome)
            .map(|r| r.step_id.as_str())
            .collect()
    }

    /// Mark the run finished, deriving the status from the results
    pub fn finish(&mut self, interrupted: bool) {
        self.status = if !self.is_success() {
            ExecutionStatus::Failed
        } else if interrupted {
            ExecutionStatus::Cancelled
        } else {
            ExecutionStatus::Completed
        };
        self.completed_at = Some(Utc::now());
    }

    /// Total wall-clock time, once finished
    pub fn elapsed(&self) -> Option<Duration> {
        self.completed_at
            .and_then(|end| end.signed_duration_since(self.started_at).to_std().ok())
    }
}
