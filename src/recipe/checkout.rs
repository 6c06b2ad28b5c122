//! `checkout` recipe: clone, switch branch, or no-op

use crate::recipe::{process, require, Recipe, RecipeConfig, RecipeContext, RecipeError};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CheckoutRecipe {
    repository: String,
    branch: String,
    path: String,
    target: PathBuf,
    git: String,
}

/// What the working copy at the target path needs
#[derive(Debug, Clone, PartialEq, Eq)]
enum CheckoutState {
    Missing,
    Repository,
    Occupied,
}

async fn inspect(target: &Path) -> Result<CheckoutState, RecipeError> {
    if fs::try_exists(target.join(".git")).await.unwrap_or(false) {
        return Ok(CheckoutState::Repository);
    }
    let meta = match fs::metadata(target).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CheckoutState::Missing),
        Err(e) => return Err(RecipeError::filesystem(target, e)),
    };
    if !meta.is_dir() {
        return Ok(CheckoutState::Occupied);
    }
    let mut entries = fs::read_dir(target)
        .await
        .map_err(|e| RecipeError::filesystem(target, e))?;
    let first = entries
        .next_entry()
        .await
        .map_err(|e| RecipeError::filesystem(target, e))?;
    Ok(if first.is_some() {
        CheckoutState::Occupied
    } else {
        CheckoutState::Missing
    })
}

impl CheckoutRecipe {
    pub fn new(repository: String, branch: String, path: String) -> Self {
        Self {
            repository,
            branch,
            path,
            target: PathBuf::new(),
            git: String::new(),
        }
    }

    async fn current_branch(&self, ctx: &RecipeContext) -> Result<Option<String>, RecipeError> {
        let out = process::output(
            ctx,
            Some(&self.target),
            &self.git,
            ["rev-parse", "--abbrev-ref", "HEAD"],
        )
        .await?;
        if !out.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&out.stdout).trim().to_string()))
    }
}

#[async_trait]
impl Recipe for CheckoutRecipe {
    async fn initialize(&mut self, config: &RecipeConfig) -> Result<(), RecipeError> {
        require("repository", &self.repository)?;
        require("branch", &self.branch)?;
        require("path", &self.path)?;
        self.target = config.resolve(&self.path);
        self.git = config.git.clone();
        Ok(())
    }

    async fn run(&self, ctx: &mut RecipeContext) -> Result<(), RecipeError> {
        match inspect(&self.target).await? {
            CheckoutState::Repository => {
                if self.current_branch(ctx).await?.as_deref() == Some(self.branch.as_str()) {
                    info!("{} already on branch {}", self.path, self.branch);
                    return Ok(());
                }
                info!("Switching {} to branch {}", self.path, self.branch);
                let target = Some(self.target.as_path());
                process::run(ctx, target, &self.git, ["fetch", "origin", self.branch.as_str()]).await?;
                process::run(ctx, target, &self.git, ["checkout", self.branch.as_str()]).await
            }
            CheckoutState::Occupied => Err(RecipeError::filesystem(
                &self.target,
                "path exists and is not a git repository",
            )),
            CheckoutState::Missing => {
                if let Some(parent) = self.target.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| RecipeError::filesystem(parent, e))?;
                }
                info!("Cloning {} ({}) into {}", self.repository, self.branch, self.path);
                let args: [&OsStr; 6] = [
                    OsStr::new("clone"),
                    OsStr::new("--branch"),
                    OsStr::new(&self.branch),
                    OsStr::new("--single-branch"),
                    OsStr::new(&self.repository),
                    self.target.as_os_str(),
                ];
                process::run(ctx, None, &self.git, args).await
            }
        }
    }
}
