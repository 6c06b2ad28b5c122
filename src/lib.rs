//! stepforge - declarative build pipelines, run as waves or compiled into programs

pub mod cli;
pub mod codegen;
pub mod core;
pub mod execution;
pub mod recipe;

// Re-export commonly used types
pub use codegen::{generate, run_generation, CodegenError, GeneratedProgram};
pub use core::{
    Action, BuildError, CompiledPipeline, Environment, ExecutionStatus, Pipeline, RunReport, Step,
    StepOutcome, StepResult,
};
pub use execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy};
pub use recipe::{CustomHandler, CustomRegistry, Recipe, RecipeConfig, RecipeError};
