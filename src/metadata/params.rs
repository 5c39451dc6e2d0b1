//! Layout parameter substitution.
//!
//! A layout may leave parts of its rules and commands open as `{NAME}`
//! placeholders, filled in by the verifier. Substitution runs on the decoded
//! payload, before rules are parsed.

use regex_lite::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use super::MetadataError;

/// Fields of steps and inspections whose strings are substituted.
const SUBSTITUTED_FIELDS: &[&str] = &[
    "expected_materials",
    "expected_products",
    "expected_command",
    "run",
];

/// Replace `{NAME}` placeholders in the rules and commands of a layout payload.
pub fn substitute_parameters(
    layout: &mut Value,
    parameters: &BTreeMap<String, String>,
) -> Result<(), MetadataError> {
    let placeholder = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_-]*)\}")?;

    for section in ["steps", "inspect"] {
        let Some(items) = layout.get_mut(section).and_then(Value::as_array_mut) else {
            continue;
        };
        for item in items {
            for field in SUBSTITUTED_FIELDS {
                if let Some(value) = item.get_mut(*field) {
                    substitute_strings(value, &placeholder, parameters)?;
                }
            }
        }
    }
    Ok(())
}

fn substitute_strings(
    value: &mut Value,
    placeholder: &Regex,
    parameters: &BTreeMap<String, String>,
) -> Result<(), MetadataError> {
    match value {
        Value::String(text) => {
            if let Some(missing) = placeholder
                .captures_iter(text)
                .map(|c| c[1].to_string())
                .find(|name| !parameters.contains_key(name))
            {
                return Err(MetadataError::MissingParameter(missing));
            }
            let replaced = placeholder.replace_all(text, |caps: &regex_lite::Captures<'_>| {
                parameters[&caps[1]].clone()
            });
            *text = replaced.into_owned();
        }
        Value::Array(values) => {
            for v in values {
                substitute_strings(v, placeholder, parameters)?;
            }
        }
        _ => {}
    }
    Ok(())
}
