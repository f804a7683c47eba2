// src/utils/lenient_json.rs

use std::{fmt, ops::Range, sync::LazyLock};

use regex::Regex;
use serde_json::Value;

/// PHP diagnostics printed into the response body ahead of (or after) the payload.
static PHP_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:<br\s*/?>\s*)?<b>\s*(warning|notice|deprecated|fatal error|parse error)\s*</b>\s*:\s*([^\n]*?)(?:<br\s*/?>|\n|$)",
    )
    .expect("PHP diagnostic pattern is valid")
});

/// Keys that commonly wrap the list we are after.
const COLLECTION_KEYS: &[&str] = &["data", "payments", "results", "rows", "records"];

#[derive(Debug, PartialEq, Eq)]
pub enum LenientError {
    Empty,
    NoJson,
    NotACollection,
}

impl fmt::Display for LenientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LenientError::Empty => f.write_str("Upstream response body is empty"),
            LenientError::NoJson => f.write_str("No JSON payload found in upstream response"),
            LenientError::NotACollection => f.write_str("Upstream payload does not contain a list of records"),
        }
    }
}

impl std::error::Error for LenientError {}

/// Pulls the JSON payload out of a response body that may be polluted with
/// PHP warnings, stray markup or trailing output.
///
/// A clean body is parsed directly. Otherwise every `{` / `[` outside a PHP
/// diagnostic is tried in order; the first object (or array of objects) wins,
/// falling back to the first value of any shape.
pub fn extract_json(body: &str) -> Result<Value, LenientError> {
    let body = body.trim_start_matches('\u{feff}').trim();
    if body.is_empty() {
        return Err(LenientError::Empty);
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }

    let mut noise: Vec<Range<usize>> = Vec::new();
    for caps in PHP_DIAGNOSTIC.captures_iter(body) {
        if let Some(whole) = caps.get(0) {
            noise.push(whole.range());
        }
        tracing::warn!(
            kind = caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
            "Upstream diagnostic in response body: {}",
            caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default()
        );
    }

    let mut fallback: Option<Value> = None;
    for (pos, ch) in body.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        if noise.iter().any(|r| r.contains(&pos)) {
            continue;
        }

        let mut stream = serde_json::Deserializer::from_str(&body[pos..]).into_iter::<Value>();
        let Some(Ok(value)) = stream.next() else {
            continue;
        };

        if looks_like_payload(&value) {
            tracing::debug!(offset = pos, "Recovered JSON payload from polluted response");
            return Ok(value);
        }
        fallback.get_or_insert(value);
    }

    fallback.ok_or(LenientError::NoJson)
}

/// Returns the list of records carried by `value`, unwrapping one or two
/// levels of `{"data": ...}`-style envelopes.
pub fn unwrap_collection(value: Value) -> Result<Vec<Value>, LenientError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in COLLECTION_KEYS {
                match map.remove(*key) {
                    Some(Value::Array(items)) => return Ok(items),
                    Some(inner @ Value::Object(_)) => {
                        if let Ok(items) = unwrap_collection(inner) {
                            return Ok(items);
                        }
                    }
                    _ => {}
                }
            }
            Err(LenientError::NotACollection)
        }
        _ => Err(LenientError::NotACollection),
    }
}

fn looks_like_payload(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().all(Value::is_object),
        _ => false,
    }
}
