//! `shell` recipe: `sh -c <command>`

use crate::recipe::{process, require, Recipe, RecipeConfig, RecipeContext, RecipeError};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ShellRecipe {
    command: String,
    working_dir: Option<String>,
    resolved_dir: Option<PathBuf>,
}

impl ShellRecipe {
    pub fn new(command: String, working_dir: Option<String>) -> Self {
        Self {
            command,
            working_dir,
            resolved_dir: None,
        }
    }
}

#[async_trait]
impl Recipe for ShellRecipe {
    async fn initialize(&mut self, config: &RecipeConfig) -> Result<(), RecipeError> {
        require("command", &self.command)?;
        if let Some(dir) = &self.working_dir {
            require("working_dir", dir)?;
            self.resolved_dir = Some(config.resolve(dir));
        }
        Ok(())
    }

    async fn run(&self, ctx: &mut RecipeContext) -> Result<(), RecipeError> {
        info!("Running shell command: {}", self.command);
        process::run(ctx, self.resolved_dir.as_deref(), "sh", ["-c", self.command.as_str()]).await
    }
}
