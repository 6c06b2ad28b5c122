//! Pipeline definitions from JSON or YAML

use crate::core::{
    context::Environment,
    pipeline::Pipeline,
    step::{Action, Step},
};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// Top-level pipeline definition as written by users
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Global environment; scalar values are stringified
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Pipeline steps
    pub steps: Vec<StepConfig>,
}

/// Step definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    pub action: Action,

    /// List of step IDs this step depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Step-local environment overrides
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Condition expression gating the step
    #[serde(default, alias = "if")]
    pub condition: Option<String>,
}

fn step_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern is valid"))
}

impl PipelineConfig {
    /// Load a definition file; `.yaml`/`.yml` are read as YAML, anything else as JSON
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
        .with_context(|| format!("Invalid pipeline definition in {}", path.display()))
    }

    /// Parse a definition from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Field-level checks; graph structure is validated separately
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        check_env("env", &self.env)?;

        for step in &self.steps {
            if !step_id_pattern().is_match(&step.id) {
                anyhow::bail!(
                    "Step '{}': field 'id' may only contain letters, digits, '_' and '-'",
                    step.id
                );
            }
            check_env(&format!("steps.{}.env", step.id), &step.env)?;

            if let Some(condition) = &step.condition {
                if condition.trim().is_empty() {
                    anyhow::bail!("Step '{}': field 'condition' must not be empty", step.id);
                }
            }
        }

        Ok(())
    }

    /// Convert into the pipeline model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline {
            name: self.name.clone(),
            description: self.description.clone(),
            env: env_from_values(&self.env),
            steps: self
                .steps
                .iter()
                .map(|s| Step {
                    id: s.id.clone(),
                    name: s.name.clone().unwrap_or_else(|| s.id.clone()),
                    action: s.action.clone(),
                    depends_on: s.depends_on.clone(),
                    env: env_from_values(&s.env),
                    condition: s.condition.clone(),
                })
                .collect(),
        }
    }
}

fn check_env(field: &str, env: &BTreeMap<String, Value>) -> Result<()> {
    for (key, value) in env {
        if key.is_empty() {
            anyhow::bail!("Field '{}' contains an empty variable name", field);
        }
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            anyhow::bail!(
                "Field '{}': variable '{}' must be a string, number, boolean or null",
                field,
                key
            );
        }
    }
    Ok(())
}

fn env_from_values(values: &BTreeMap<String, Value>) -> Environment {
    values
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}
