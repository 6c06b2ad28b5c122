//! Main execution engine - runs a compiled pipeline wave by wave

use crate::{
    core::{CompiledPipeline, ExecutionStatus, RunReport, StepOutcome, StepResult},
    execution::{SchedulingStrategy, StepExecutor},
    recipe::{CustomRegistry, RecipeConfig},
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
        wave_count: usize,
    },
    WaveStarted {
        index: usize,
        step_ids: Vec<String>,
    },
    StepStarted {
        step_id: String,
    },
    StepSkipped {
        step_id: String,
        reason: String,
    },
    StepSucceeded {
        step_id: String,
        duration: Duration,
    },
    StepFailed {
        step_id: String,
        error: String,
        stderr: String,
    },
    WaveCompleted {
        index: usize,
    },
    RunInterrupted {
        remaining_steps: usize,
    },
    RunCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

pub const SKIP_INTERRUPTED: &str = "run interrupted";
pub const SKIP_CONDITION: &str = "condition evaluated to false";

fn skip_dependency_failed(step_id: &str) -> String {
    format!("dependency '{}' failed", step_id)
}

/// Main pipeline execution engine
pub struct ExecutionEngine {
    executor: Arc<StepExecutor>,
    strategy: SchedulingStrategy,
    event_handlers: Vec<EventHandler>,
    interrupted: Arc<AtomicBool>,
}

impl ExecutionEngine {
    pub fn new(config: RecipeConfig, strategy: SchedulingStrategy) -> Self {
        Self::with_registry(config, strategy, CustomRegistry::new())
    }

    pub fn with_registry(
        config: RecipeConfig,
        strategy: SchedulingStrategy,
        registry: CustomRegistry,
    ) -> Self {
        Self {
            executor: Arc::new(StepExecutor::new(config, Arc::new(registry))),
            strategy,
            event_handlers: Vec::new(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    /// Flag checked before each wave; setting it stops the run at the next barrier
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    fn record_skip(&self, results: &mut HashMap<String, StepResult>, step_id: &str, reason: String) {
        info!("Skipping step {}: {}", step_id, reason);
        self.emit_event(ExecutionEvent::StepSkipped {
            step_id: step_id.to_string(),
            reason: reason.clone(),
        });
        results.insert(step_id.to_string(), StepResult::skipped(step_id, reason));
    }

    /// Execute the entire pipeline
    ///
    /// Step failures never abort the run; they skip the failed step's
    /// transitive dependents and are reflected in the report's status.
    pub async fn execute(&self, compiled: &CompiledPipeline) -> RunReport {
        let pipeline = compiled.pipeline();
        let plan = compiled.plan();
        let global = Arc::new(pipeline.env.clone());

        let mut report = RunReport::new(&pipeline.name);
        report.status = ExecutionStatus::Running;

        info!(
            "Starting pipeline execution: {} ({}, {} scheduling)",
            pipeline.name, report.execution_id, self.strategy
        );
        self.emit_event(ExecutionEvent::RunStarted {
            execution_id: report.execution_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: plan.step_count(),
            wave_count: plan.wave_count(),
        });

        let mut results: HashMap<String, StepResult> = HashMap::new();
        let mut outcomes: HashMap<String, StepOutcome> = HashMap::new();
        // Step id -> the failed step that caused it to be skipped
        let mut cascade: HashMap<String, String> = HashMap::new();
        let mut interrupted = false;

        for (index, wave) in plan.waves().iter().enumerate() {
            if self.interrupted.load(Ordering::SeqCst) {
                let remaining: Vec<&String> = plan.waves()[index..].iter().flatten().collect();
                warn!(
                    "Run interrupted before wave {}; skipping {} remaining step(s)",
                    index,
                    remaining.len()
                );
                self.emit_event(ExecutionEvent::RunInterrupted {
                    remaining_steps: remaining.len(),
                });
                for step_id in remaining {
                    self.record_skip(&mut results, step_id, SKIP_INTERRUPTED.to_string());
                    outcomes.insert(step_id.clone(), StepOutcome::Skipped);
                }
                interrupted = true;
                break;
            }

            debug!("Wave {}: {:?}", index, wave);
            self.emit_event(ExecutionEvent::WaveStarted {
                index,
                step_ids: wave.clone(),
            });

            let semaphore = Arc::new(Semaphore::new(self.strategy.permits(wave.len())));
            let mut tasks = JoinSet::new();
            let mut dispatched = HashSet::new();

            for step_id in wave {
                let Some(step) = pipeline.step(step_id) else {
                    continue;
                };

                if let Some(failed) = cascade.get(step_id) {
                    let reason = skip_dependency_failed(failed);
                    self.record_skip(&mut results, step_id, reason);
                    outcomes.insert(step_id.clone(), StepOutcome::Skipped);
                    continue;
                }

                let env = global.merged_with(&step.env);

                if let Some(condition) = compiled.condition(step_id) {
                    if !condition.evaluate(&env, &outcomes) {
                        self.record_skip(&mut results, step_id, SKIP_CONDITION.to_string());
                        outcomes.insert(step_id.clone(), StepOutcome::Skipped);
                        continue;
                    }
                }

                self.emit_event(ExecutionEvent::StepStarted {
                    step_id: step_id.clone(),
                });

                let executor = self.executor.clone();
                let semaphore = semaphore.clone();
                let step = step.clone();
                dispatched.insert(step_id.clone());
                tasks.spawn(async move {
                    // The semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    executor.execute(&step, env).await
                });
            }

            // Barrier: every dispatched step reaches a terminal outcome
            let mut finished = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(result) => finished.push(result),
                    Err(e) => error!("Step task aborted: {}", e),
                }
            }
            for result in &finished {
                dispatched.remove(&result.step_id);
            }
            for lost in dispatched {
                let mut result = StepResult::skipped(&lost, "step task aborted");
                result.outcome = StepOutcome::Failed;
                finished.push(result);
            }

            for result in finished {
                let step_id = result.step_id.clone();
                match result.outcome {
                    StepOutcome::Failed => {
                        let error = result.detail.clone().unwrap_or_default();
                        self.emit_event(ExecutionEvent::StepFailed {
                            step_id: step_id.clone(),
                            error,
                            stderr: result.stderr.clone(),
                        });
                        for dependent in compiled.graph().transitive_dependents(&step_id) {
                            cascade
                                .entry(dependent.to_string())
                                .or_insert_with(|| step_id.clone());
                        }
                    }
                    _ => {
                        self.emit_event(ExecutionEvent::StepSucceeded {
                            step_id: step_id.clone(),
                            duration: result.duration,
                        });
                    }
                }
                outcomes.insert(step_id.clone(), result.outcome);
                results.insert(step_id, result);
            }

            self.emit_event(ExecutionEvent::WaveCompleted { index });
        }

        report.results = plan
            .step_ids()
            .filter_map(|id| results.remove(id))
            .collect();
        report.finish(interrupted);

        info!(
            "Pipeline execution finished: {} - {:?}",
            pipeline.name, report.status
        );
        self.emit_event(ExecutionEvent::RunCompleted {
            execution_id: report.execution_id,
            status: report.status,
        });

        report
    }
}
