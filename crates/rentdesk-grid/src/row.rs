// ── Row access ──
//
// Rows are opaque JSON values. The grid only reaches into them through
// dotted paths and the loose scalar coercions below, and never mutates them.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// A single grid row. Any JSON shape is accepted.
pub type Row = Value;

/// Stable identity of a row across re-renders and selection.
pub type RowId = String;

/// Resolve a dotted path (`"address.city"`, `"tags.0"`) inside a row.
///
/// Missing segments and explicit `null` both yield `None`.
pub fn value_at<'a>(row: &'a Row, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(row, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|v| !v.is_null())
}

/// Plain string form of a value, used for search, grouping and CSV.
///
/// Integral floats print without a fraction (`3.0` -> `"3"`), composite
/// values serialize as compact JSON.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| format!("{f}")).unwrap_or_default()
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Loose truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric value of a cell for sorting. Anything non-numeric becomes `0`.
pub fn sort_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_float_prefix(s),
        _ => None,
    };
    parsed.filter(|f| !f.is_nan()).unwrap_or(0.0)
}

/// Strict numeric value used by the formatters: a JSON number, or a string
/// that is entirely a number.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

/// Parse the longest leading decimal number in `s` (`"12.5kg"` -> `12.5`).
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let trimmed = s.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return None;
    }

    // Optional exponent, only if followed by at least one digit.
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while matches!(bytes.get(exp_end), Some(b'0'..=b'9')) {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }

    trimmed.get(..end)?.parse::<f64>().ok()
}

/// Interpret a cell as a UTC timestamp in milliseconds.
///
/// Accepts epoch milliseconds, RFC 3339, `YYYY-MM-DD[ T]HH:MM:SS[.f]` and
/// bare `YYYY-MM-DD`. Naive values are taken as UTC.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
            n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)
        }),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

// ── Identity ────────────────────────────────────────────────────────

/// Custom identity accessor.
pub type IdentityFn = Arc<dyn Fn(&Row) -> RowId + Send + Sync>;

/// How a row's identity is derived.
///
/// `Default` tries `id`, then `_id`, then falls back to the row's compact
/// JSON. That fallback changes whenever any field changes, so rows without
/// an id field lose their selection across data refreshes; supply `Field`
/// or `Custom` for such datasets.
#[derive(Clone, Default)]
pub enum RowIdentity {
    #[default]
    Default,
    Field(String),
    Custom(IdentityFn),
}

impl RowIdentity {
    pub fn custom(f: impl Fn(&Row) -> RowId + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn id_of(&self, row: &Row) -> RowId {
        match self {
            Self::Default => ["id", "_id"]
                .iter()
                .find_map(|field| value_at(row, field).filter(|v| is_truthy(v)))
                .map_or_else(|| row.to_string(), display_string),
            Self::Field(path) => {
                value_at(row, path).map_or_else(|| row.to_string(), display_string)
            }
            Self::Custom(f) => f(row),
        }
    }
}

impl fmt::Debug for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Field(path) => f.debug_tuple("Field").field(path).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
