//! Pipeline domain model

use crate::core::{context::Environment, step::Step};
use serde::{Deserialize, Serialize};

/// A pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Pipeline steps, in declaration order
    pub steps: Vec<Step>,

    /// Global variables available to all steps
    #[serde(default)]
    pub env: Environment,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            env: Environment::new(),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Step IDs in declaration order
    pub fn step_ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.id.as_str())
    }

    /// Environment a step runs with: global values overridden by the step's own
    pub fn env_for_step(&self, step: &Step) -> Environment {
        self.env.merged_with(&step.env)
    }
}
