//! Safe scalar parsing for semi-structured API payloads.
//!
//! The upstream source emits inconsistent types across endpoint versions:
//! the same stat arrives as a number, a quoted number, or null depending on
//! the day. These functions convert an arbitrary JSON scalar into a strict
//! optional typed value and never panic; anything unconvertible is `None`,
//! never a silently substituted default.

use serde_json::Value;

/// Parse an integer from a JSON scalar.
///
/// Numbers are accepted directly (floats truncate toward zero), booleans map
/// to 0/1, and strings must be pure integer literals after trimming.
pub fn parse_int(x: &Value) -> Option<i64> {
    match x {
        Value::Null => None,
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Parse a float from a JSON scalar. Strings are trimmed before parsing.
pub fn parse_float(x: &Value) -> Option<f64> {
    match x {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parse a boolean from a JSON scalar.
///
/// Recognizes the token sets {true, t, yes, y, 1} and {false, f, no, n, 0}
/// case-insensitively, and any numeric value via truthiness. An unknown
/// token is ambiguous and yields `None`, not `false`.
pub fn parse_bool(x: &Value) -> Option<bool> {
    match x {
        Value::Null => None,
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" => Some(true),
            "false" | "f" | "0" | "no" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a string from a JSON scalar.
///
/// Numbers and booleans are rendered to text. Whitespace is trimmed; a value
/// that is empty after trimming is absent, not empty-string.
pub fn parse_string(x: &Value) -> Option<String> {
    let s = match x {
        Value::Null => return None,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
