//! Step executor - runs one step through its recipe lifecycle

use crate::{
    core::{Environment, Step, StepOutcome, StepResult},
    recipe::{recipe_for, run_lifecycle, CustomRegistry, RecipeConfig, RecipeContext},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Executes a single step
#[derive(Debug, Clone)]
pub struct StepExecutor {
    config: RecipeConfig,
    registry: Arc<CustomRegistry>,
}

impl StepExecutor {
    pub fn new(config: RecipeConfig, registry: Arc<CustomRegistry>) -> Self {
        Self { config, registry }
    }

    /// Run a step with its merged environment
    ///
    /// Never returns an error: recipe failures become a `Failed` result.
    pub async fn execute(&self, step: &Step, env: Environment) -> StepResult {
        info!("Executing step: {} ({})", step.id, step.action.kind());

        let started_at = Utc::now();
        let clock = Instant::now();
        let mut ctx = RecipeContext::new(self.config.workspace.clone(), env);
        let mut recipe = recipe_for(&step.action, self.registry.clone());

        let lifecycle = run_lifecycle(recipe.as_mut(), &self.config, &mut ctx).await;

        let (outcome, detail) = match lifecycle {
            Ok(()) => {
                debug!("Step {} succeeded", step.id);
                (StepOutcome::Success, None)
            }
            Err(e) => {
                error!("Step {} failed: {}", step.id, e);
                (StepOutcome::Failed, Some(e.to_string()))
            }
        };

        StepResult {
            step_id: step.id.clone(),
            outcome,
            stdout: ctx.output.stdout,
            stderr: ctx.output.stderr,
            duration: clock.elapsed(),
            started_at: Some(started_at),
            exit_code: ctx.output.exit_code,
            detail,
        }
    }
}
