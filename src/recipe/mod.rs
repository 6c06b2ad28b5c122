//! Recipes: the executable behavior behind each action kind

pub mod artifact;
pub mod cache;
pub mod checkout;
pub mod compile;
pub mod custom;
pub mod process;
pub mod shell;
pub mod test_run;

use crate::core::{Action, Environment};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use artifact::ArtifactRecipe;
pub use cache::CacheRecipe;
pub use checkout::CheckoutRecipe;
pub use compile::CompileRecipe;
pub use custom::{CustomHandler, CustomRecipe, CustomRegistry, DEFAULT_HANDLER_PREFIX};
pub use shell::ShellRecipe;
pub use test_run::TestRunRecipe;

/// Errors a recipe can report; each one fails only its own step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecipeError {
    #[error("missing required parameter '{0}'")]
    MissingRequiredParameter(String),

    #[error("invalid value for parameter '{name}': {reason}")]
    InvalidParameterValue { name: String, reason: String },

    #[error("failed to spawn '{program}': {reason}")]
    ProcessSpawnFailed { program: String, reason: String },

    #[error("process exited with code {0}")]
    ProcessExitNonZero(i32),

    #[error("filesystem error at {path}: {reason}")]
    FilesystemError { path: String, reason: String },

    #[error("custom handler '{type_name}' failed: {reason}")]
    HandlerFailed { type_name: String, reason: String },
}

impl RecipeError {
    pub(crate) fn filesystem(path: &Path, err: impl std::fmt::Display) -> Self {
        RecipeError::FilesystemError {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Runtime knobs shared by every recipe
#[derive(Debug, Clone)]
pub struct RecipeConfig {
    /// Root that relative paths are resolved against
    pub workspace: PathBuf,

    /// Compiler/test-runner program
    pub toolchain: String,

    pub git: String,

    pub tar: String,

    /// Names the default cache directory
    pub app_name: String,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            toolchain: "zig".to_string(),
            git: "git".to_string(),
            tar: "tar".to_string(),
            app_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

impl RecipeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_toolchain(mut self, toolchain: impl Into<String>) -> Self {
        self.toolchain = toolchain.into();
        self
    }

    pub fn with_git(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_tar(mut self, tar: impl Into<String>) -> Self {
        self.tar = tar.into();
        self
    }

    /// Resolve a path against the workspace (absolute paths pass through)
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.workspace.join(path)
    }

    /// `$HOME/.cache/<app-name>`, falling back to the platform home directory
    pub fn default_cache_dir(&self) -> PathBuf {
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| self.workspace.clone());
        home.join(".cache").join(&self.app_name)
    }
}

/// Captured process output for one step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,

    /// Exit code of the most recent process
    pub exit_code: Option<i32>,
}

impl CapturedOutput {
    pub fn record(&mut self, output: &std::process::Output) {
        self.stdout.push_str(&String::from_utf8_lossy(&output.stdout));
        self.stderr.push_str(&String::from_utf8_lossy(&output.stderr));
        self.exit_code = Some(output.status.code().unwrap_or(-1));
    }
}

/// What a running recipe can see and write to
#[derive(Debug, Clone)]
pub struct RecipeContext {
    pub working_dir: PathBuf,

    /// Global environment merged with the step's overrides
    pub env: Environment,

    pub output: CapturedOutput,
}

impl RecipeContext {
    pub fn new(working_dir: impl Into<PathBuf>, env: Environment) -> Self {
        Self {
            working_dir: working_dir.into(),
            env,
            output: CapturedOutput::default(),
        }
    }
}

/// Uniform lifecycle for every action kind
///
/// `release` is called after a successful `initialize`, whether `run`
/// succeeded or not.
#[async_trait]
pub trait Recipe: Send + Sync {
    /// Validate parameters and resolve paths
    async fn initialize(&mut self, config: &RecipeConfig) -> Result<(), RecipeError>;

    async fn run(&self, ctx: &mut RecipeContext) -> Result<(), RecipeError>;

    async fn release(&mut self) {}
}

/// Drive a recipe through initialize, run and release
pub async fn run_lifecycle(
    recipe: &mut dyn Recipe,
    config: &RecipeConfig,
    ctx: &mut RecipeContext,
) -> Result<(), RecipeError> {
    recipe.initialize(config).await?;
    let result = recipe.run(ctx).await;
    recipe.release().await;
    result
}

/// Build the recipe for an action
pub fn recipe_for(action: &Action, registry: Arc<CustomRegistry>) -> Box<dyn Recipe> {
    match action {
        Action::Shell {
            command,
            working_dir,
        } => Box::new(ShellRecipe::new(command.clone(), working_dir.clone())),
        Action::Compile {
            source_file,
            output_name,
            optimize,
        } => Box::new(CompileRecipe::new(
            source_file.clone(),
            output_name.clone(),
            *optimize,
        )),
        Action::TestRun { test_file, filter } => {
            Box::new(TestRunRecipe::new(test_file.clone(), filter.clone()))
        }
        Action::Checkout {
            repository,
            branch,
            path,
        } => Box::new(CheckoutRecipe::new(
            repository.clone(),
            branch.clone(),
            path.clone(),
        )),
        Action::Artifact {
            source_path,
            destination,
        } => Box::new(ArtifactRecipe::new(source_path.clone(), destination.clone())),
        Action::Cache {
            action,
            key,
            paths,
            cache_dir,
        } => Box::new(CacheRecipe::new(
            *action,
            key.clone(),
            paths,
            cache_dir.clone(),
        )),
        Action::Custom {
            type_name,
            parameters,
        } => Box::new(CustomRecipe::new(
            type_name.clone(),
            parameters.clone(),
            registry,
        )),
    }
}

pub(crate) fn require(name: &str, value: &str) -> Result<(), RecipeError> {
    if value.trim().is_empty() {
        return Err(RecipeError::MissingRequiredParameter(name.to_string()));
    }
    if value.contains('\0') {
        return Err(RecipeError::InvalidParameterValue {
            name: name.to_string(),
            reason: "contains a NUL character".to_string(),
        });
    }
    Ok(())
}
