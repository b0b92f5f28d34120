//! Forgiving field readers for save data.
//!
//! Use with `#[serde(default, deserialize_with = "or_default")]`: a missing
//! field takes the container default, a `null` or wrongly typed one takes the
//! field type's default.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Read a field, falling back to `T::default()` when it is null or malformed.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    #[serde(default)]
    struct Counters {
        #[serde(deserialize_with = "or_default")]
        kills: u32,
        #[serde(deserialize_with = "or_default")]
        name: String,
        #[serde(deserialize_with = "or_default")]
        tags: Vec<u8>,
    }

    #[test]
    fn test_null_and_wrong_type_default() {
        let c: Counters =
            serde_json::from_str(r#"{"kills": null, "name": 4, "tags": "x"}"#).unwrap();
        assert_eq!(c, Counters::default());
    }

    #[test]
    fn test_missing_defaults_and_valid_kept() {
        let c: Counters = serde_json::from_str(r#"{"kills": 7}"#).unwrap();
        assert_eq!(c.kills, 7);
        assert!(c.name.is_empty());
    }

    #[test]
    fn test_negative_into_unsigned_defaults() {
        let c: Counters = serde_json::from_str(r#"{"kills": -3, "tags": [1, 2]}"#).unwrap();
        assert_eq!(c.kills, 0);
        assert_eq!(c.tags, vec![1, 2]);
    }
}
