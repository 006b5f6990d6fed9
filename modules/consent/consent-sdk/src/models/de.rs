//! Tolerant field decoders shared by the models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Decodes `null` as the type's default, so `"vendors": null` becomes `[]`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes an RFC 3339 timestamp; anything else (number, garbage, `null`) is `None`.
pub fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "null_as_default")]
        list: Vec<String>,
        #[serde(default, deserialize_with = "lenient_datetime")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn null_and_missing_fields_fall_back_to_defaults() {
        let p: Probe = serde_json::from_str(r#"{"list": null, "at": null}"#).unwrap();
        assert!(p.list.is_empty());
        assert!(p.at.is_none());

        let p: Probe = serde_json::from_str("{}").unwrap();
        assert!(p.list.is_empty());
        assert!(p.at.is_none());
    }

    #[test]
    fn unparseable_timestamp_is_dropped() {
        let p: Probe = serde_json::from_str(r#"{"at": "yesterday"}"#).unwrap();
        assert!(p.at.is_none());

        let p: Probe = serde_json::from_str(r#"{"at": "2022-08-25T20:56:38.551Z"}"#).unwrap();
        assert_eq!(p.at.unwrap().timestamp(), 1_661_460_998);
    }
}
