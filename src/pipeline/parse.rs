//! Model reply parsing: raw text → rows.
//!
//! The reply must be a JSON array of objects. The only leniency is a single
//! outer Markdown code fence (```` ```json ... ``` ````), which models add
//! despite being told not to; it is removed before parsing. Anything else that
//! does not parse is an error for the page.

use crate::item::RawLineItem;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Remove one outer code fence, if the whole reply is wrapped in one.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    }
}

/// Parse a model reply into raw rows.
///
/// Errors describe what was wrong; the caller attaches the page number.
pub fn parse_rows(reply: &str) -> Result<Vec<RawLineItem>, String> {
    let body = strip_code_fence(reply);
    let value: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;

    let elements = match value {
        Value::Array(elements) => elements,
        other => return Err(format!("expected a JSON array, got {}", json_type(&other))),
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(i, element)| match element {
            Value::Object(_) => serde_json::from_value(element)
                .map_err(|e| format!("row {}: {}", i + 1, e)),
            other => Err(format!(
                "row {} is {}, expected an object",
                i + 1,
                json_type(&other)
            )),
        })
        .collect()
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
