//! Pipeline environment - read-only variables shared by all steps

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An ordered, read-only set of environment variables
///
/// The global environment is built once per pipeline and shared behind an
/// `Arc` during a run. Step-local overrides never touch it; they produce a
/// derived copy through [`Environment::merged_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Check whether a variable is defined
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Derive a new environment where `overrides` win over `self`
    pub fn merged_with(&self, overrides: &Environment) -> Environment {
        let mut vars = self.vars.clone();
        vars.extend(
            overrides
                .vars
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Environment { vars }
    }

    /// Iterate variables in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
