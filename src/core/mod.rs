//! Core domain models for pipelines
//!
//! This module defines pipelines, steps and their actions, and the
//! build-time validation that turns a pipeline into an executable plan.

pub mod condition;
pub mod config;
pub mod context;
pub mod graph;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod validation;

pub use condition::{Condition, ConditionError};
pub use context::Environment;
pub use graph::{DependencyGraph, ExecutionPlan, GraphError};
pub use pipeline::Pipeline;
pub use state::{ExecutionStatus, RunReport, StepOutcome, StepResult};
pub use step::{Action, CacheOperation, OptimizeMode, Step};
pub use validation::{BuildError, CompiledPipeline};
