//! Canonical timestamp normalization.
//!
//! # Responsibility
//! - Accept every historical `createdAt` representation found in storage.
//! - Produce one canonical ISO-8601 text form for reads and writes.
//!
//! # Invariants
//! - `normalize` never panics and always returns a parseable ISO string.
//! - `normalize` is idempotent: feeding its output back returns it unchanged.
//! - Legacy shapes are accepted on read only; writers always emit ISO text.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Closed set of stored timestamp shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    /// Text that is expected to already be ISO-8601.
    Iso(String),
    /// Unix epoch milliseconds.
    EpochMillis(i64),
    /// Legacy cloud timestamp object: `{ "seconds": n }`.
    LegacySeconds { seconds: f64 },
    /// In-process date value.
    Native(DateTime<Utc>),
    /// Absent or unrecognized input.
    Missing,
}

impl RawTimestamp {
    /// Classifies a stored JSON value.
    ///
    /// Objects are recognized only when they carry a numeric `seconds` member;
    /// extra members such as `nanoseconds` are ignored.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::Iso(text.clone()),
            Value::Number(number) => {
                if let Some(millis) = number.as_i64() {
                    Self::EpochMillis(millis)
                } else {
                    match number.as_f64() {
                        Some(millis) if millis.is_finite() => Self::EpochMillis(millis as i64),
                        _ => Self::Missing,
                    }
                }
            }
            Value::Object(map) => match map.get("seconds").and_then(Value::as_f64) {
                Some(seconds) => Self::LegacySeconds { seconds },
                None => Self::Missing,
            },
            _ => Self::Missing,
        }
    }

    /// Classifies a CSV cell.
    ///
    /// Empty text is `Missing`; an all-digit cell is epoch milliseconds;
    /// anything else is treated as ISO text and validated by `normalize`.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        if trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            if let Ok(millis) = trimmed.parse::<i64>() {
                return Self::EpochMillis(millis);
            }
        }
        Self::Iso(trimmed.to_string())
    }
}

/// Converts any accepted timestamp shape into canonical ISO-8601 text.
///
/// Output uses UTC, millisecond precision and a `Z` suffix, e.g.
/// `2023-11-14T22:13:20.000Z`. Unrecognized input falls back to the current
/// time.
pub fn normalize(raw: &RawTimestamp) -> String {
    match raw {
        RawTimestamp::Iso(text) if is_iso_text(text) => text.clone(),
        RawTimestamp::Iso(_) | RawTimestamp::Missing => now_iso(),
        RawTimestamp::EpochMillis(millis) => from_millis(*millis),
        RawTimestamp::LegacySeconds { seconds } => {
            let millis = seconds * 1000.0;
            if millis.is_finite() {
                from_millis(millis as i64)
            } else {
                now_iso()
            }
        }
        RawTimestamp::Native(value) => format_iso(value),
    }
}

/// Returns the current time in canonical ISO-8601 form.
pub fn now_iso() -> String {
    format_iso(&Utc::now())
}

/// Formats a UTC date in canonical ISO-8601 form.
pub fn format_iso(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Returns whether `text` is already acceptable ISO-8601 output.
///
/// Full RFC 3339 date-times and bare `YYYY-MM-DD` dates are accepted.
pub fn is_iso_text(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

fn from_millis(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(value) => format_iso(&value),
        None => now_iso(),
    }
}
