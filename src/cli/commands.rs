//! CLI command definitions

use crate::execution::SchedulingStrategy;
use crate::recipe::RecipeConfig;
use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline definition (JSON, or YAML by extension)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Environment overrides (KEY=VALUE)
    #[arg(long, value_parser = parse_key_value)]
    pub var: Vec<(String, String)>,

    /// Scheduling strategy within a wave
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Maximum concurrent steps per wave (implies the limited strategy)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Directory steps run in (defaults to the current directory)
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Compiler program used by compile and test_run steps
    #[arg(long)]
    pub toolchain: Option<String>,

    /// git program used by checkout steps
    #[arg(long)]
    pub git: Option<String>,

    /// tar program used by cache steps
    #[arg(long)]
    pub tar: Option<String>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    /// Recipe settings with the program and workspace overrides applied
    pub fn recipe_config(&self) -> RecipeConfig {
        let mut config = RecipeConfig::new();
        if let Some(workspace) = &self.workspace {
            config = config.with_workspace(workspace);
        }
        if let Some(toolchain) = &self.toolchain {
            config = config.with_toolchain(toolchain);
        }
        if let Some(git) = &self.git {
            config = config.with_git(git);
        }
        if let Some(tar) = &self.tar {
            config = config.with_tar(tar);
        }
        config
    }

    pub fn scheduling_strategy(&self) -> SchedulingStrategy {
        match (self.strategy, self.concurrency) {
            (SchedulingStrategyArg::Sequential, _) => SchedulingStrategy::Sequential,
            (_, Some(n)) => SchedulingStrategy::LimitedParallel(n),
            (SchedulingStrategyArg::Limited, None) => SchedulingStrategy::LimitedParallel(4),
            (SchedulingStrategyArg::Parallel, None) => SchedulingStrategy::Parallel,
        }
    }
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline definition
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output the execution plan in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Generate a standalone program
#[derive(Debug, Args, Clone)]
pub struct GenerateCommand {
    /// Path to pipeline definition
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output directory for the generated crate
    #[arg(short, long)]
    pub out: PathBuf,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    Limited,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid KEY=VALUE pair: {}", s)),
    }
}
