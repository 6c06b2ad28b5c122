//! The single escaping routine for user-supplied text in generated code

use crate::codegen::CodegenError;
use std::fmt::Write;

/// Render `value` as a Rust string literal, quotes included
///
/// `context` names the field being escaped and is only used in errors.
/// NUL cannot reach a process argument, environment entry or path, so it is
/// rejected instead of escaped.
pub fn quote(context: &str, value: &str) -> Result<String, CodegenError> {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\0' => {
                return Err(CodegenError::EscapingFailure {
                    context: context.to_string(),
                    reason: "value contains a NUL character".to_string(),
                })
            }
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() || is_text_direction(c) => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(out)
}

/// `Some("..")` or `None`
pub fn quote_option(context: &str, value: Option<&str>) -> Result<String, CodegenError> {
    match value {
        Some(v) => Ok(format!("Some({})", quote(context, v)?)),
        None => Ok("None".to_string()),
    }
}

/// Text safe to place inside a `//` comment
pub fn comment(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() || is_text_direction(c) { ' ' } else { c })
        .collect()
}

/// Bidi embedding, override and isolate characters, which rustc rejects
/// unescaped in literals and comments
fn is_text_direction(c: char) -> bool {
    matches!(c, '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}')
}
