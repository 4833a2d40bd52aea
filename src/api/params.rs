//! Typed extraction of request parameters. HTTP query strings arrive as
//! strings, JSON bodies as native values; both are accepted where sensible.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::Capacity;

/// Absent and `null` both read as `None`. Blank strings also read as `None`.
pub fn opt_str(params: &Value, key: &str) -> Result<Option<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok((!t.is_empty()).then(|| t.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(Error::validation(format!("{key} must be a string"))),
    }
}

/// Like [`opt_str`] but keeps the difference between "absent" (`None`) and
/// "explicitly cleared" (`Some(None)`).
pub fn nullable_str(params: &Value, key: &str) -> Result<Option<Option<String>>> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(_) => Ok(Some(opt_str(params, key)?)),
    }
}

/// Password-like fields: whitespace is significant.
pub fn opt_raw_str(params: &Value, key: &str) -> Result<Option<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::validation(format!("{key} must be a string"))),
    }
}

pub fn opt_i64(params: &Value, key: &str) -> Result<Option<i64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| Error::validation(format!("{key} must be an integer"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| Error::validation(format!("{key} must be an integer"))),
        Some(_) => Err(Error::validation(format!("{key} must be an integer"))),
    }
}

pub fn required_id(params: &Value, key: &str) -> Result<String> {
    opt_str(params, key)?.ok_or_else(|| Error::validation(format!("missing {key}")))
}

pub fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    let t = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return Ok(d);
    }
    DateTime::parse_from_rfc3339(t)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| Error::validation(format!("{key} must be a date (YYYY-MM-DD)")))
}

pub fn parse_time(key: &str, raw: &str) -> Result<NaiveTime> {
    let t = raw.trim();
    NaiveTime::parse_from_str(t, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
        .map_err(|_| Error::validation(format!("{key} must be a time of day (HH:MM)")))
}

/// RFC 3339 instant, or a bare date meaning midnight UTC.
pub fn parse_timestamp(key: &str, raw: &str) -> Result<DateTime<Utc>> {
    let t = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Error::validation(format!("{key} must be a date or RFC 3339 timestamp")))
}

pub fn parse_choice<T>(
    key: &str,
    raw: &str,
    parse: fn(&str) -> Option<T>,
    choices: String,
) -> Result<T> {
    parse(raw).ok_or_else(|| Error::validation(format!("{key} must be one of: {choices}")))
}

pub fn capacity(value: Option<i64>) -> Result<Capacity> {
    match value {
        None => Ok(Capacity::Unlimited),
        Some(n) if n > 0 && n <= i64::from(u32::MAX) => Ok(Capacity::Limited(n as u32)),
        Some(_) => Err(Error::validation("maxCapacity must be a positive integer")),
    }
}
