//! `compile` recipe: `<toolchain> build-exe`

use crate::core::OptimizeMode;
use crate::recipe::{process, require, Recipe, RecipeConfig, RecipeContext, RecipeError};
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CompileRecipe {
    source_file: String,
    output_name: String,
    optimize: OptimizeMode,
    toolchain: String,
}

impl CompileRecipe {
    pub fn new(source_file: String, output_name: String, optimize: OptimizeMode) -> Self {
        Self {
            source_file,
            output_name,
            optimize,
            toolchain: String::new(),
        }
    }

    fn args(&self) -> [&str; 6] {
        [
            "build-exe",
            &self.source_file,
            "-O",
            self.optimize.as_str(),
            "--name",
            &self.output_name,
        ]
    }
}

#[async_trait]
impl Recipe for CompileRecipe {
    async fn initialize(&mut self, config: &RecipeConfig) -> Result<(), RecipeError> {
        require("source_file", &self.source_file)?;
        require("output_name", &self.output_name)?;
        self.toolchain = config.toolchain.clone();
        Ok(())
    }

    async fn run(&self, ctx: &mut RecipeContext) -> Result<(), RecipeError> {
        info!(
            "Compiling {} -> {} ({})",
            self.source_file, self.output_name, self.optimize
        );
        process::run(ctx, None, &self.toolchain, self.args()).await
    }
}
