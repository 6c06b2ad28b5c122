//! `test_run` recipe: `<toolchain> test`

use crate::recipe::{process, require, Recipe, RecipeConfig, RecipeContext, RecipeError};
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TestRunRecipe {
    test_file: String,
    filter: Option<String>,
    toolchain: String,
}

impl TestRunRecipe {
    pub fn new(test_file: String, filter: Option<String>) -> Self {
        Self {
            test_file,
            filter,
            toolchain: String::new(),
        }
    }

    fn args(&self) -> Vec<&str> {
        let mut args = vec!["test", self.test_file.as_str()];
        if let Some(filter) = &self.filter {
            args.push("--test-filter");
            args.push(filter);
        }
        args
    }
}

#[async_trait]
impl Recipe for TestRunRecipe {
    async fn initialize(&mut self, config: &RecipeConfig) -> Result<(), RecipeError> {
        require("test_file", &self.test_file)?;
        if let Some(filter) = &self.filter {
            require("filter", filter)?;
        }
        self.toolchain = config.toolchain.clone();
        Ok(())
    }

    async fn run(&self, ctx: &mut RecipeContext) -> Result<(), RecipeError> {
        info!("Running tests in {}", self.test_file);
        process::run(ctx, None, &self.toolchain, self.args()).await
    }
}
