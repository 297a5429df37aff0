// Lenient deserializers for collaborator-supplied records.
//
// Order-management and manufacturer-profile payloads arrive with scalars
// where lists are expected, numbers as strings, and nulls anywhere. Field
// shape problems are resolved here so downstream code only sees clean values.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept a string, a number, or a (possibly mixed) array for a list field.
/// Empty and whitespace-only entries are dropped.
pub fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(collect_strings).unwrap_or_default())
}

fn collect_strings(value: Value) -> Vec<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                vec![]
            } else {
                vec![trimmed.to_string()]
            }
        }
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.into_iter().flat_map(collect_strings).collect(),
        _ => vec![],
    }
}

/// Accept a number, a numeric string, or null; anything else becomes None.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Same as `lenient_f64` but truncating to an integer count.
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }))
}

/// Accept a string, or null; non-strings and empty strings become None.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }))
}

/// Accept an RFC 3339 timestamp, a bare date, or a unix epoch; otherwise None.
pub fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => {
            let trimmed = s.trim();
            DateTime::parse_from_rfc3339(trimmed)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "string_or_seq")]
        items: Vec<String>,
        #[serde(default, deserialize_with = "lenient_f64")]
        rating: Option<f64>,
        #[serde(default, deserialize_with = "lenient_i64")]
        count: Option<i64>,
        #[serde(default, deserialize_with = "lenient_datetime")]
        deadline: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_scalar_coerced_to_list() {
        let probe: Probe = serde_json::from_str(r#"{"items": "CNC Machining"}"#).unwrap();
        assert_eq!(probe.items, vec!["CNC Machining"]);
    }

    #[test]
    fn test_empty_entries_dropped() {
        let probe: Probe =
            serde_json::from_str(r#"{"items": ["Casting", "", "   ", "Welding"]}"#).unwrap();
        assert_eq!(probe.items, vec!["Casting", "Welding"]);
    }

    #[test]
    fn test_numeric_string_parsed() {
        let probe: Probe = serde_json::from_str(r#"{"rating": "4.5", "count": "12"}"#).unwrap();
        assert_eq!(probe.rating, Some(4.5));
        assert_eq!(probe.count, Some(12));
    }

    #[test]
    fn test_wrong_types_become_none() {
        let probe: Probe =
            serde_json::from_str(r#"{"rating": {"oops": 1}, "count": [3], "items": null}"#)
                .unwrap();
        assert_eq!(probe.rating, None);
        assert_eq!(probe.count, None);
        assert!(probe.items.is_empty());
    }

    #[test]
    fn test_date_formats() {
        let probe: Probe = serde_json::from_str(r#"{"deadline": "2026-09-01"}"#).unwrap();
        assert!(probe.deadline.is_some());

        let probe: Probe =
            serde_json::from_str(r#"{"deadline": "2026-09-01T12:30:00Z"}"#).unwrap();
        assert!(probe.deadline.is_some());

        let probe: Probe = serde_json::from_str(r#"{"deadline": "next tuesday"}"#).unwrap();
        assert!(probe.deadline.is_none());
    }
}
