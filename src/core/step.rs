//! Step domain model

use crate::core::context::Environment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name
    pub name: String,

    /// What the step does
    pub action: Action,

    /// List of step IDs this step depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Step-local environment overrides
    #[serde(default)]
    pub env: Environment,

    /// Optional condition expression gating execution
    #[serde(default)]
    pub condition: Option<String>,
}

impl Step {
    /// Create a step with no dependencies, overrides or condition
    pub fn new(id: impl Into<String>, name: impl Into<String>, action: Action) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            action,
            depends_on: Vec::new(),
            env: Environment::new(),
            condition: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// The action a step performs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum Action {
    Shell {
        command: String,
        #[serde(default)]
        working_dir: Option<String>,
    },
    Compile {
        source_file: String,
        output_name: String,
        #[serde(default)]
        optimize: OptimizeMode,
    },
    TestRun {
        test_file: String,
        #[serde(default)]
        filter: Option<String>,
    },
    Checkout {
        repository: String,
        branch: String,
        path: String,
    },
    Artifact {
        source_path: String,
        destination: String,
    },
    Cache {
        action: CacheOperation,
        key: String,
        /// Comma-separated list of paths
        #[serde(default)]
        paths: String,
        #[serde(default)]
        cache_dir: Option<String>,
    },
    Custom {
        type_name: String,
        #[serde(default)]
        parameters: BTreeMap<String, String>,
    },
}

impl Action {
    /// Short name of the action kind, as used in definitions
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Shell { .. } => "shell",
            Action::Compile { .. } => "compile",
            Action::TestRun { .. } => "test_run",
            Action::Checkout { .. } => "checkout",
            Action::Artifact { .. } => "artifact",
            Action::Cache { .. } => "cache",
            Action::Custom { .. } => "custom",
        }
    }
}

/// Toolchain optimization mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeMode {
    #[default]
    Debug,
    ReleaseSafe,
    ReleaseFast,
    ReleaseSmall,
}

impl OptimizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizeMode::Debug => "Debug",
            OptimizeMode::ReleaseSafe => "ReleaseSafe",
            OptimizeMode::ReleaseFast => "ReleaseFast",
            OptimizeMode::ReleaseSmall => "ReleaseSmall",
        }
    }
}

impl fmt::Display for OptimizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOperation {
    Restore,
    Save,
}
