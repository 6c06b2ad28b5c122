//! Template fragments and `{{ key }}` rendering

use crate::codegen::CodegenError;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const MAIN_RS: &str = "main.rs";
pub const CARGO_TOML: &str = "Cargo.toml";

const FRAGMENTS: &[(&str, &str)] = &[
    (MAIN_RS, include_str!("templates/main.rs.tmpl")),
    (CARGO_TOML, include_str!("templates/Cargo.toml.tmpl")),
];

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("static pattern is valid")
    })
}

/// Look up a named fragment
pub fn fragment(name: &str) -> Result<&'static str, CodegenError> {
    FRAGMENTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, body)| *body)
        .ok_or_else(|| CodegenError::TemplateMissing {
            name: name.to_string(),
            detail: "no such fragment".to_string(),
        })
}

/// Fill every placeholder in one pass; substituted text is not rescanned
pub fn render(
    name: &str,
    template: &str,
    values: &BTreeMap<&str, String>,
) -> Result<String, CodegenError> {
    let mut missing = Vec::new();
    let rendered = placeholder().replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match values.get(key) {
            Some(value) => value.clone(),
            None => {
                missing.push(key.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(CodegenError::TemplateMissing {
            name: name.to_string(),
            detail: format!("unfilled placeholder(s): {}", missing.join(", ")),
        });
    }
    Ok(rendered.into_owned())
}

/// Render a named fragment
pub fn render_fragment(name: &str, values: &BTreeMap<&str, String>) -> Result<String, CodegenError> {
    render(name, fragment(name)?, values)
}
