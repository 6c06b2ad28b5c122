//! `custom` recipe and the handler registry it dispatches to

use crate::recipe::{process, require, Recipe, RecipeConfig, RecipeContext, RecipeError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Executable prefix used when no in-process handler matches
pub const DEFAULT_HANDLER_PREFIX: &str = "stepforge-handler-";

/// In-process implementation of a custom action type
#[async_trait]
pub trait CustomHandler: Send + Sync {
    async fn handle(
        &self,
        parameters: &BTreeMap<String, String>,
        ctx: &mut RecipeContext,
    ) -> anyhow::Result<()>;
}

/// Maps custom `type_name`s to handlers
#[derive(Clone, Default)]
pub struct CustomRegistry {
    handlers: HashMap<String, Arc<dyn CustomHandler>>,
    executable_prefix: Option<String>,
}

impl fmt::Debug for CustomRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("CustomRegistry")
            .field("handlers", &names)
            .field("executable_prefix", &self.executable_prefix)
            .finish()
    }
}

/// `--key=value` arguments in key order
pub fn handler_args(parameters: &BTreeMap<String, String>) -> Vec<String> {
    parameters
        .iter()
        .map(|(k, v)| format!("--{}={}", k, v))
        .collect()
}

impl CustomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, type_name: impl Into<String>, handler: impl CustomHandler + 'static) -> Self {
        self.handlers.insert(type_name.into(), Arc::new(handler));
        self
    }

    /// Run `<prefix><type_name>` for types without a registered handler
    pub fn with_executable_fallback(mut self, prefix: impl Into<String>) -> Self {
        self.executable_prefix = Some(prefix.into());
        self
    }

    pub async fn dispatch(
        &self,
        type_name: &str,
        parameters: &BTreeMap<String, String>,
        ctx: &mut RecipeContext,
    ) -> Result<(), RecipeError> {
        if let Some(handler) = self.handlers.get(type_name) {
            debug!("Dispatching custom action '{}' to registered handler", type_name);
            return handler
                .handle(parameters, ctx)
                .await
                .map_err(|e| RecipeError::HandlerFailed {
                    type_name: type_name.to_string(),
                    reason: format!("{:#}", e),
                });
        }

        let Some(prefix) = &self.executable_prefix else {
            return Err(RecipeError::HandlerFailed {
                type_name: type_name.to_string(),
                reason: "no handler registered".to_string(),
            });
        };

        let program = format!("{}{}", prefix, type_name);
        info!("Running custom handler {}", program);
        process::run(ctx, None, &program, handler_args(parameters))
            .await
            .map_err(|e| match e {
                RecipeError::ProcessSpawnFailed { reason, .. } => RecipeError::HandlerFailed {
                    type_name: type_name.to_string(),
                    reason: format!("no handler registered and '{}' could not be run: {}", program, reason),
                },
                other => other,
            })
    }
}

#[derive(Debug, Clone)]
pub struct CustomRecipe {
    type_name: String,
    parameters: BTreeMap<String, String>,
    registry: Arc<CustomRegistry>,
}

impl CustomRecipe {
    pub fn new(
        type_name: String,
        parameters: BTreeMap<String, String>,
        registry: Arc<CustomRegistry>,
    ) -> Self {
        Self {
            type_name,
            parameters,
            registry,
        }
    }
}

#[async_trait]
impl Recipe for CustomRecipe {
    async fn initialize(&mut self, _config: &RecipeConfig) -> Result<(), RecipeError> {
        require("type_name", &self.type_name)?;
        for key in self.parameters.keys() {
            if key.is_empty() || key.contains('=') {
                return Err(RecipeError::InvalidParameterValue {
                    name: format!("parameters.{}", key),
                    reason: "parameter names must be non-empty and must not contain '='".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn run(&self, ctx: &mut RecipeContext) -> Result<(), RecipeError> {
        self.registry
            .dispatch(&self.type_name, &self.parameters, ctx)
            .await
    }
}
