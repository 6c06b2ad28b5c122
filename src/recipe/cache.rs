//! `cache` recipe: save or restore a tarball keyed by name

use crate::core::CacheOperation;
use crate::recipe::{process, Recipe, RecipeConfig, RecipeContext, RecipeError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CacheRecipe {
    operation: CacheOperation,
    key: String,
    paths: Vec<String>,
    cache_dir: Option<String>,
    resolved_dir: PathBuf,
    tar: String,
}

/// Split a comma-separated path list, dropping blanks
pub fn split_paths(paths: &str) -> Vec<String> {
    paths
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Keys name a file inside the cache directory
pub fn validate_key(key: &str) -> Result<(), RecipeError> {
    let reason = if key.trim().is_empty() {
        "must not be empty"
    } else if key.contains('/') || key.contains('\\') {
        "must not contain path separators"
    } else if key.contains("..") {
        "must not contain '..'"
    } else if key.contains('\0') {
        "contains a NUL character"
    } else {
        return Ok(());
    };
    Err(RecipeError::InvalidParameterValue {
        name: "key".to_string(),
        reason: reason.to_string(),
    })
}

impl CacheRecipe {
    pub fn new(
        operation: CacheOperation,
        key: String,
        paths: &str,
        cache_dir: Option<String>,
    ) -> Self {
        Self {
            operation,
            key,
            paths: split_paths(paths),
            cache_dir,
            resolved_dir: PathBuf::new(),
            tar: String::new(),
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.resolved_dir.join(format!("{}.tar.gz", self.key))
    }

    async fn save(&self, ctx: &mut RecipeContext) -> Result<(), RecipeError> {
        let mut present: Vec<&String> = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            if fs::try_exists(ctx.working_dir.join(path)).await.unwrap_or(false) {
                present.push(path);
            } else {
                warn!("Cache '{}': skipping missing path {}", self.key, path);
            }
        }

        if present.is_empty() {
            info!("Cache '{}': nothing to save", self.key);
            return Ok(());
        }

        fs::create_dir_all(&self.resolved_dir)
            .await
            .map_err(|e| RecipeError::filesystem(&self.resolved_dir, e))?;

        let mut args: Vec<OsString> = vec![
            "-czf".into(),
            self.archive_path().into_os_string(),
            "-C".into(),
            ctx.working_dir.clone().into_os_string(),
        ];
        args.extend(present.into_iter().map(OsString::from));

        info!("Cache '{}': saving to {}", self.key, self.archive_path().display());
        process::run(ctx, None, &self.tar, args).await
    }

    async fn restore(&self, ctx: &mut RecipeContext) -> Result<(), RecipeError> {
        let archive = self.archive_path();
        let hit = fs::metadata(&archive).await.map(|m| m.is_file()).unwrap_or(false);
        if !hit {
            info!("Cache '{}': miss", self.key);
            return Ok(());
        }

        fs::create_dir_all(&ctx.working_dir)
            .await
            .map_err(|e| RecipeError::filesystem(&ctx.working_dir, e))?;

        info!("Cache '{}': hit, restoring from {}", self.key, archive.display());
        let args: Vec<OsString> = vec![
            "-xzf".into(),
            archive.into_os_string(),
            "-C".into(),
            ctx.working_dir.clone().into_os_string(),
        ];
        process::run(ctx, None, &self.tar, args).await
    }
}

#[async_trait]
impl Recipe for CacheRecipe {
    async fn initialize(&mut self, config: &RecipeConfig) -> Result<(), RecipeError> {
        validate_key(&self.key)?;
        self.resolved_dir = match self.cache_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => config.resolve(dir),
            _ => config.default_cache_dir(),
        };
        self.tar = config.tar.clone();
        Ok(())
    }

    async fn run(&self, ctx: &mut RecipeContext) -> Result<(), RecipeError> {
        match self.operation {
            CacheOperation::Save => self.save(ctx).await,
            CacheOperation::Restore => self.restore(ctx).await,
        }
    }
}
