//! The four validation engines.
//!
//! Each engine is a flat, ordered list of rule functions. A rule reads the
//! documents and returns zero or more violations; the engine concatenates
//! every rule's output and hands the result to the [`Synthesizer`].
//!
//! | Engine | Subject | Reference data | Warning tier |
//! |--------|---------|----------------|--------------|
//! | [`allocation`] | proposed allocation | settings, watchlist | no |
//! | [`holdings`] | owned positions | watchlist | yes |
//! | [`report`] | markdown analysis report | none | no |
//! | [`research`] | thesis check + candidates | thesis catalog, watchlist | no |
//!
//! [`Synthesizer`]: crate::synthesizer::Synthesizer

pub mod allocation;
pub mod holdings;
pub mod patterns;
pub mod report;
pub mod research;

use chrono::NaiveDate;
use serde_json::Value;

/// Name of a JSON value's type, for violation details.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Render a value inline: strings without quotes, everything else as JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// True when the value is a string with non-whitespace content.
pub(crate) fn is_non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.trim().is_empty())
}

/// Parse a strict `YYYY-MM-DD` date.
///
/// Unpadded fields, signs and whitespace are rejected even where chrono's
/// own parser would accept them.
pub(crate) fn parse_iso_str(raw: &str) -> Option<NaiveDate> {
    if !patterns::ISO_DATE.is_match(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Parse an ISO `YYYY-MM-DD` date from a raw JSON value.
pub(crate) fn parse_iso_date(value: &Value) -> Option<NaiveDate> {
    value.as_str().and_then(parse_iso_str)
}

/// Render an allowed-value list the way details quote it: `['a', 'b']`.
pub(crate) fn allowed_list(allowed: &[&str]) -> String {
    let quoted: Vec<String> = allowed.iter().map(|a| format!("'{}'", a)).collect();
    format!("[{}]", quoted.join(", "))
}
