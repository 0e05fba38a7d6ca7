use chrono::{TimeZone, Utc};
use geojson::Feature;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MISSING_VALUE: &str = "N/A";

/// Epoch-millisecond fields shown as calendar dates.
const TIMESTAMP_KEYS: [&str; 2] = ["time", "updated"];

/// One line of the feature inspection panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRow {
    pub key: String,
    pub value: String,
}

/// Display rows for a clicked fault trace or earthquake, in source order.
///
/// Geometry is never listed. Null, `""`, `0` and `false` all read `N/A`.
#[must_use]
pub fn feature_property_rows(feature: &Feature) -> Vec<PropertyRow> {
    let Some(properties) = &feature.properties else {
        return Vec::new();
    };

    properties
        .iter()
        .filter(|(key, _)| key.as_str() != "geometry")
        .map(|(key, value)| PropertyRow {
            key: key.clone(),
            value: display_value(key, value),
        })
        .collect()
}

fn display_value(key: &str, value: &Value) -> String {
    if is_blank(value) {
        return MISSING_VALUE.to_string();
    }
    if TIMESTAMP_KEYS.contains(&key) {
        if let Some(formatted) = value.as_i64().and_then(format_epoch_millis) {
            return formatted;
        }
    }

    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(n),
        other => other.to_string(),
    }
}

#[allow(clippy::float_cmp)]
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(true) | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Integers keep their digits; whole floats drop the trailing `.0`.
fn format_number(n: &serde_json::Number) -> String {
    match (n.as_i64(), n.as_u64(), n.as_f64()) {
        (Some(i), _, _) => i.to_string(),
        (None, Some(u), _) => u.to_string(),
        (None, None, Some(f)) => f.to_string(),
        (None, None, None) => n.to_string(),
    }
}

/// `MM/DD/YYYY, HH:MM:SS AM UTC`
fn format_epoch_millis(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|at| at.format("%m/%d/%Y, %I:%M:%S %p UTC").to_string())
}
