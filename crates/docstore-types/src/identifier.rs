//! Document identifiers.
//!
//! Identifiers are UUIDs in their canonical form: lowercase, hyphenated,
//! 36 characters. Any spelling the `uuid` crate accepts (braced, `urn:uuid:`,
//! simple, upper case) is normalized to that form.

use serde_json::Value;
use uuid::Uuid;

/// Generate a fresh random identifier in canonical form.
pub fn generate() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Normalize `candidate` to a canonical identifier, or `None` if it is not one.
pub fn is_uuid(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return None;
    }
    Uuid::parse_str(trimmed)
        .ok()
        .map(|id| id.hyphenated().to_string())
}

/// Like [`is_uuid`], for a structured value. Only strings can be identifiers.
pub fn is_uuid_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => is_uuid(s),
        _ => None,
    }
}
