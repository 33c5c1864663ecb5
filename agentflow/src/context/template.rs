//! Instruction templates with `{key}` placeholders.
//!
//! `{key}` must be present in the context; `{key?}` renders empty when
//! absent. String values are inserted verbatim, anything else as JSON.

use super::ContextSnapshot;
use crate::errors::ConfigurationError;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

const PLACEHOLDER: &str = r"\{([A-Za-z_][A-Za-z0-9_:.\-]*)(\?)?\}";

#[allow(clippy::expect_used)]
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(PLACEHOLDER).expect("placeholder pattern is valid"))
}

/// Returns the context keys referenced by a template, in order of first use.
#[must_use]
pub fn template_keys(template: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in placeholder_pattern().captures_iter(template) {
        let key = caps[1].to_string();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Resolves a template against a context snapshot.
///
/// # Errors
///
/// Returns `ConfigurationError` (`MissingContextKey`) when a required
/// placeholder has no value.
pub fn render_instruction(
    worker: &str,
    template: &str,
    context: &ContextSnapshot,
) -> Result<String, ConfigurationError> {
    let mut missing: Option<String> = None;

    let rendered = placeholder_pattern().replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[1];
        let optional = caps.get(2).is_some();
        match context.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None if optional => String::new(),
            None => {
                if missing.is_none() {
                    missing = Some(key.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(key) => Err(ConfigurationError::missing_context_key(worker, &key)),
        None => Ok(rendered.into_owned()),
    }
}
