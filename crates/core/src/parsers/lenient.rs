//! Tolerant field deserializers for third-party captures.
//!
//! Capture files are often truncated or hand-edited. Every helper here turns a
//! wrongly-shaped value into a documented default instead of an error, so the
//! parsers only ever see fully-typed data.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize `T`, falling back to `T::default()` when the value has the
/// wrong shape.
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Array of `T`, skipping elements that do not deserialize. A non-array
/// yields an empty vec.
pub(crate) fn vec_skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| T::deserialize(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Positional array: invalid elements become `T::default()` so that indices
/// stay aligned with sibling arrays. A non-array yields an empty vec.
pub(crate) fn vec_lossy<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| T::deserialize(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

/// Object of `T` keyed by id, in the map's iteration order, skipping entries
/// that do not deserialize. A non-object yields an empty vec.
pub(crate) fn entries_skip_invalid<'de, D, T>(
    deserializer: D,
) -> Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, item)| T::deserialize(item).ok().map(|t| (key, t)))
            .collect(),
        _ => Vec::new(),
    })
}

/// A finite number that may also arrive as a numeric string (`"ts": "1234"`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Num(pub f64);

impl<'de> Deserialize<'de> for Num {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        let n = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n,
            Raw::Text(s) => s.trim().parse::<f64>().map_err(D::Error::custom)?,
        };
        if n.is_finite() {
            Ok(Num(n))
        } else {
            Err(D::Error::custom("non-finite number"))
        }
    }
}

/// A frame / node identifier. Captures use both `"12"` and `12`; both map to
/// the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct FrameKey(pub String);

impl<'de> Deserialize<'de> for FrameKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Uint(u64),
            Float(f64),
            Text(String),
        }

        Ok(FrameKey(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => n.to_string(),
            Raw::Uint(n) => n.to_string(),
            Raw::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
            Raw::Float(f) => f.to_string(),
            Raw::Text(s) => s,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "or_default")]
        name: String,
        #[serde(default, deserialize_with = "or_default")]
        ts: Option<Num>,
        #[serde(default, deserialize_with = "vec_skip_invalid")]
        ids: Vec<FrameKey>,
        #[serde(default, deserialize_with = "vec_lossy")]
        deltas: Vec<Num>,
        #[serde(default, deserialize_with = "entries_skip_invalid")]
        frames: Vec<(String, Num)>,
    }

    #[test]
    fn wrong_types_fall_back_to_defaults() {
        let probe = Probe::deserialize(&json!({
            "name": 42,
            "ts": {"nested": true},
            "ids": "nope",
            "deltas": null,
            "frames": [1, 2]
        }))
        .unwrap();
        assert_eq!(probe.name, "");
        assert_eq!(probe.ts, None);
        assert!(probe.ids.is_empty());
        assert!(probe.deltas.is_empty());
        assert!(probe.frames.is_empty());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let probe = Probe::deserialize(&json!({})).unwrap();
        assert_eq!(probe.name, "");
        assert!(probe.ts.is_none());
    }

    #[test]
    fn numeric_strings_are_numbers() {
        let probe = Probe::deserialize(&json!({"ts": " 1500.5 "})).unwrap();
        assert_eq!(probe.ts, Some(Num(1500.5)));
    }

    #[test]
    fn ids_accept_strings_and_numbers() {
        let probe = Probe::deserialize(&json!({"ids": [1, "2", 3.0, true, {"x": 1}]})).unwrap();
        let ids: Vec<_> = probe.ids.into_iter().map(|k| k.0).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn positional_arrays_keep_alignment() {
        let probe = Probe::deserialize(&json!({"deltas": [10, "bad", 5]})).unwrap();
        assert_eq!(probe.deltas, vec![Num(10.0), Num(0.0), Num(5.0)]);
    }

    #[test]
    fn object_entries_skip_invalid_values() {
        let probe = Probe::deserialize(&json!({"frames": {"a": 1, "b": "x", "c": "3"}})).unwrap();
        assert_eq!(
            probe.frames,
            vec![("a".to_string(), Num(1.0)), ("c".to_string(), Num(3.0))]
        );
    }
}
