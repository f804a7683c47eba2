// src/utils/dates.rs

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

/// Naive layouts seen from the portal backends, tried in order.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Parses a timestamp string into portal-local time.
///
/// Values carrying an explicit offset are converted into `offset`; naive
/// values are taken to already be portal-local.
pub fn parse_portal_datetime(raw: &str, offset: FixedOffset) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&offset).naive_local());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    None
}

/// Same as [`parse_portal_datetime`] but also accepts Unix timestamps (seconds or milliseconds).
pub fn parse_portal_value(value: &Value, offset: FixedOffset) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_portal_datetime(s, offset),
        Value::Number(n) => {
            let n = n.as_i64()?;
            // Anything past the year 5138 in seconds is assumed to be milliseconds.
            let dt = if n.abs() >= 100_000_000_000 {
                DateTime::from_timestamp_millis(n)?
            } else {
                DateTime::from_timestamp(n, 0)?
            };
            Some(dt.with_timezone(&offset).naive_local())
        }
        _ => None,
    }
}

/// Current wall-clock time in the portal's offset.
pub fn portal_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local()
}
