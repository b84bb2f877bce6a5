//! Prompt template compilation
//!
//! Templates use `{name}` placeholders where `name` is one or more ASCII
//! letters, digits or underscores. Anything else in braces is literal text.

use std::collections::HashMap;

/// Substitute every `{name}` placeholder in `template` with its value.
///
/// Placeholders without a value render as an empty string. Braces that do
/// not form a placeholder pass through unchanged.
pub fn compile_prompt(template: &str, values: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        match placeholder_name(after_open) {
            Some(name) => {
                if let Some(value) = values.get(name) {
                    output.push_str(value);
                }
                rest = &after_open[name.len() + 1..];
            }
            None => {
                output.push('{');
                rest = after_open;
            }
        }
    }

    output.push_str(rest);
    output
}

/// Names of all placeholders in `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after_open = &rest[open + 1..];
        match placeholder_name(after_open) {
            Some(name) => {
                if !names.contains(&name) {
                    names.push(name);
                }
                rest = &after_open[name.len() + 1..];
            }
            None => rest = after_open,
        }
    }

    names
}

/// If `s` starts with `name}`, return `name`.
fn placeholder_name(s: &str) -> Option<&str> {
    let end = s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))?;
    if end == 0 || !s[end..].starts_with('}') {
        return None;
    }
    Some(&s[..end])
}
