//! Raw source rows and the field accessors mappers use to read them.
//!
//! Upstream feeds are loosely typed: ids arrive as numbers or numeric
//! strings, flags as `0/1`, `"1"`, `true`, timestamps as local wall-clock
//! strings. Everything here is lenient on input shape and strict on meaning:
//! a value that cannot be read is `None`, never a guessed default.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde_json::Value;

/// One upstream record before mapping.
pub type RawRow = serde_json::Map<String, Value>;

/// Why a row could not become a typed entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowRejected {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Result of mapping a single row. Rejections are counted, not raised.
pub type RowOutcome<T> = Result<T, RowRejected>;

/// Values fixed for the whole cycle that every mapper call sees.
#[derive(Debug, Clone, Copy)]
pub struct MapContext {
    /// Reference instant shared by all rows of the cycle.
    pub now: DateTime<Utc>,
    /// Offset used to read local `YYYY-MM-DD HH:MM:SS` timestamps.
    pub offset: FixedOffset,
}

impl MapContext {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    pub fn utc(now: DateTime<Utc>) -> Self {
        Self { now, offset: Utc.fix() }
    }

    /// Fractional hours from `then` to the cycle's `now`.
    pub fn hours_since(&self, then: DateTime<Utc>) -> f64 {
        (self.now - then).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Whole days from `then` to `now`, never negative.
    pub fn whole_days_since(&self, then: DateTime<Utc>) -> f64 {
        (self.now - then).num_days().max(0) as f64
    }
}

const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse an RFC 3339 instant, or a local wall-clock string in `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    LOCAL_FORMATS.iter().find_map(|fmt| {
        let naive = NaiveDateTime::parse_from_str(raw, fmt).ok()?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Non-empty trimmed text; numbers are rendered as text.
pub fn text(row: &RawRow, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric value, accepting numeric strings.
pub fn number(row: &RawRow, field: &str) -> Option<f64> {
    let value = match row.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Integer value, accepting integral floats and numeric strings.
pub fn integer(row: &RawRow, field: &str) -> Option<i64> {
    match row.get(field)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Loose boolean: `true`, non-zero numbers, `"1"`, `"true"`, `"yes"`.
pub fn flag(row: &RawRow, field: &str) -> bool {
    match row.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        _ => false,
    }
}

pub fn timestamp(row: &RawRow, field: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    match row.get(field)? {
        Value::String(s) => parse_timestamp(s, offset),
        _ => None,
    }
}

/// Required integer identifier, returned as the subject key.
pub fn required_id(row: &RawRow, field: &'static str) -> RowOutcome<String> {
    match row.get(field) {
        None | Some(Value::Null) => Err(RowRejected::MissingField(field)),
        Some(_) => integer(row, field)
            .map(|id| id.to_string())
            .ok_or_else(|| RowRejected::InvalidField {
                field,
                reason: "expected an integer id".to_string(),
            }),
    }
}
