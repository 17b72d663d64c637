//! Escaping repair for stringified JSON in config schemas.
//!
//! Clients predating the 1.10 rendering fix required stringified JSON inside
//! config descriptions and string defaults to be doubly escaped:
//!
//! pre-1.10 form:  `\\\"field\\\": \\\"value\\\"`
//! 1.10+ form:     `\"field\": \"value\"`
//!
//! When downgrading a repository for such a client, every singly escaped
//! double quote must gain an extra backslash. The repair is NOT idempotent:
//! applying it twice over-escapes, so it runs exactly once, only when the
//! target generation predates the fix.

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

// Matches `.\"` but not `\\\"`, capturing the preceding character.
static UNDERESCAPED_QUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\\])""#).unwrap_or_else(|e| panic!("invalid escape pattern: {e}"))
});

/// Double every singly escaped double quote in `text`.
///
/// A quote in the very first position has no preceding character and stays
/// untouched, matching the behavior of the legacy tooling.
pub fn escape_json_string(text: &str) -> String {
    UNDERESCAPED_QUOTE
        .replace_all(text, |caps: &Captures| format!("{}\\\"", &caps[1]))
        .into_owned()
}

/// Recursively repair the `properties` map of a config schema.
///
/// Every property's `description` is repaired; `default` values of
/// string-typed properties are repaired; object-typed properties recurse
/// through their own `properties` map.
pub fn escape_config_properties(properties: &mut Map<String, Value>) {
    for property in properties.values_mut() {
        let Some(property) = property.as_object_mut() else {
            continue;
        };

        if let Some(Value::String(description)) = property.get("description") {
            let repaired = escape_json_string(description);
            property.insert("description".into(), repaired.into());
        }

        match property.get("type").and_then(Value::as_str) {
            Some("string") => {
                if let Some(Value::String(default)) = property.get("default") {
                    let repaired = escape_json_string(default);
                    property.insert("default".into(), repaired.into());
                }
            }
            Some("object") => {
                if let Some(Value::Object(nested)) = property.get_mut("properties") {
                    escape_config_properties(nested);
                }
            }
            _ => {}
        }
    }
}
