// src/ingest/mod.rs

//! Normalization boundary between the portal backends' JSON and the canonical
//! records the calculators work on. Field-name aliases, numbers sent as
//! strings and identifiers sent as numbers are all resolved here, once.

pub mod exam_rows;
pub mod payments;

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde_json::{Map, Value};

/// `1,234,567.89`: commas are thousands separators.
static GROUPED_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?\d{1,3}(?:,\d{3})+(?:\.\d+)?$").expect("grouped number pattern is valid")
});

/// `2,5`: a single comma is the decimal separator.
static DECIMAL_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?\d*,\d+$").expect("decimal comma pattern is valid")
});

#[derive(Debug, PartialEq, Eq)]
pub enum IngestError {
    /// The element at this position is not a JSON object.
    NotAnObject { index: usize },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::NotAnObject { index } => write!(f, "Record {} is not a JSON object", index),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<IngestError> for crate::error::AppError {
    fn from(err: IngestError) -> Self {
        crate::error::AppError::BadRequest(err.to_string())
    }
}

/// First non-null value among `aliases`.
fn field<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

/// Numeric value of a JSON number or numeric string; non-finite values are absent.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_decimal(s.trim())?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Commas are read as thousands separators when they group digits by three
/// (`2,500` is 2500), otherwise a lone comma is a decimal point (`2,5`).
/// Anything else with a comma is unreadable.
fn parse_decimal(s: &str) -> Option<f64> {
    if !s.contains(',') {
        s.parse().ok()
    } else if GROUPED_NUMBER.is_match(s) {
        s.replace(',', "").parse().ok()
    } else if DECIMAL_COMMA.is_match(s) {
        s.replacen(',', ".", 1).parse().ok()
    } else {
        None
    }
}

/// Identifier text from a string or a number; blank strings are absent.
/// Integral floats are written as integers so `11.0` and `11` name the same part.
fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => Some((f as i64).to_string()),
            _ => Some(n.to_string()),
        },
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
