//! Lenient field conversions for game server payloads.
//!
//! The server mixes unix seconds, numeric strings and ISO dates for
//! timestamps, and 0/1 integers for booleans.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

pub(crate) fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Value::String(s) => {
            if let Ok(secs) = s.parse::<i64>() {
                return DateTime::from_timestamp(secs, 0);
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        _ => None,
    }
}

pub(crate) fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    timestamp_from_value(&value)
        .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {value}")))
}

/// Null and negative values (the server uses -1 for "not running") become `None`.
pub(crate) fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(None),
        Value::Number(n) if n.as_i64().is_some_and(|secs| secs < 0) => Ok(None),
        _ => timestamp_from_value(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {value}"))),
    }
}

pub(crate) fn timestamp_map<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            timestamp_from_value(&value)
                .map(|ts| (key, ts))
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {value}")))
        })
        .collect()
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(truthy(&Value::deserialize(deserializer)?))
}

pub(crate) fn flag_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, truthy(&v))).collect())
}

/// Two-level map of flags, such as mission completion per character.
pub(crate) fn nested_flag_map<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, BTreeMap<String, bool>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, inner)| (k, inner.into_iter().map(|(k, v)| (k, truthy(&v))).collect()))
        .collect())
}
