//! `artifact` recipe: copy a file or directory tree

use crate::recipe::{require, Recipe, RecipeConfig, RecipeContext, RecipeError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ArtifactRecipe {
    source_path: String,
    destination: String,
    source: PathBuf,
    target: PathBuf,
}

impl ArtifactRecipe {
    pub fn new(source_path: String, destination: String) -> Self {
        Self {
            source_path,
            destination,
            source: PathBuf::new(),
            target: PathBuf::new(),
        }
    }
}

/// Copy `source` to `destination`, creating intermediate directories
///
/// A file copied onto an existing directory lands inside it under its own name.
pub fn copy_recursive(source: &Path, destination: &Path) -> Result<u64, RecipeError> {
    let meta = std::fs::metadata(source).map_err(|e| RecipeError::filesystem(source, e))?;

    if meta.is_dir() {
        std::fs::create_dir_all(destination)
            .map_err(|e| RecipeError::filesystem(destination, e))?;
        let mut copied = 0;
        let entries =
            std::fs::read_dir(source).map_err(|e| RecipeError::filesystem(source, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| RecipeError::filesystem(source, e))?;
            copied += copy_recursive(&entry.path(), &destination.join(entry.file_name()))?;
        }
        return Ok(copied);
    }

    let target = match source.file_name() {
        Some(name) if destination.is_dir() => destination.join(name),
        _ => destination.to_path_buf(),
    };
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RecipeError::filesystem(parent, e))?;
    }
    debug!("Copying {} -> {}", source.display(), target.display());
    std::fs::copy(source, &target).map_err(|e| RecipeError::filesystem(&target, e))?;
    Ok(1)
}

#[async_trait]
impl Recipe for ArtifactRecipe {
    async fn initialize(&mut self, config: &RecipeConfig) -> Result<(), RecipeError> {
        require("source_path", &self.source_path)?;
        require("destination", &self.destination)?;
        self.source = config.resolve(&self.source_path);
        self.target = config.resolve(&self.destination);
        Ok(())
    }

    async fn run(&self, _ctx: &mut RecipeContext) -> Result<(), RecipeError> {
        let source = self.source.clone();
        let target = self.target.clone();
        let copied = tokio::task::spawn_blocking(move || copy_recursive(&source, &target))
            .await
            .map_err(|e| RecipeError::filesystem(&self.target, e))??;

        info!(
            "Copied {} file(s) from {} to {}",
            copied, self.source_path, self.destination
        );
        Ok(())
    }
}
