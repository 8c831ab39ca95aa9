//! Shared coercions applied to every city's raw values.

use chrono::NaiveDate;
use serde_json::Value;

use super::record::{ADDRESS_NOT_AVAILABLE, DESCRIPTION_LIMIT, NOT_AVAILABLE};

/// Renders a loosely typed source value as trimmed text. Empty text counts as absent.
pub fn text(value: Option<&Value>) -> Option<String> {
    let rendered = match value? {
        Value::String(raw) => raw.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    let cleaned = rendered.replace(['\u{feff}', '\u{200b}'], "");
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Optional party/contact field: the trimmed text or the literal `N/A`.
pub fn optional_text(value: Option<&Value>) -> String {
    text(value).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Collapses internal whitespace and caps the text at [`DESCRIPTION_LIMIT`] characters.
pub fn description(value: Option<&Value>) -> String {
    match text(value) {
        Some(raw) => {
            let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            collapsed.chars().take(DESCRIPTION_LIMIT).collect()
        }
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Joins address components with single spaces, skipping empty parts.
pub fn join_address<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = parts
        .into_iter()
        .map(|part| part.as_ref().trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        ADDRESS_NOT_AVAILABLE.to_string()
    } else {
        joined
    }
}

/// A date value that is present but does not start with `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDate(pub String);

/// Issue date from the first ten characters of the source representation.
///
/// Absent values resolve to `fallback`.
pub fn issue_date(value: Option<&Value>, fallback: NaiveDate) -> Result<NaiveDate, InvalidDate> {
    let Some(raw) = text(value) else {
        return Ok(fallback);
    };
    let prefix = raw.get(..10).unwrap_or(raw.as_str());
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").map_err(|_| InvalidDate(raw.clone()))
}

/// Largest cost a single permit may carry; anything above is a data-entry error.
pub const MAX_COST: u64 = 1_000_000_000_000;

/// Cost in whole currency units, `None` unless the value is a positive number no larger
/// than [`MAX_COST`].
pub fn cost(value: Option<&Value>) -> Option<u64> {
    let amount = match value? {
        Value::Number(number) => number.as_f64()?,
        other => text(Some(other))?.parse::<f64>().ok()?,
    };

    if amount.is_finite() && amount > 0.0 && amount <= MAX_COST as f64 {
        Some(amount.trunc() as u64)
    } else {
        None
    }
}

/// Integer coercion; anything that does not coerce is treated as absent.
pub fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        other => {
            let raw = text(Some(other))?;
            raw.parse::<i64>().ok().or_else(|| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
    }
}

/// Five-digit ZIP code; portals sometimes ship them as floats or ZIP+4.
pub fn zip_code(value: Option<&Value>) -> Option<String> {
    let raw = text(value)?;
    let head = raw.split('-').next().unwrap_or(raw.as_str());
    integer(Some(&Value::String(head.to_string())))
        .filter(|zip| (0..100_000).contains(zip))
        .map(|zip| format!("{zip:05}"))
}
