//! Scenario-based tests for stepforge

mod artifacts_and_cache;
mod cli;
mod codegen;
mod conditions;
mod custom_handlers;
mod failure_cascade;
mod waves;
