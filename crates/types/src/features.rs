//! `track_features` is a space or comma separated string in repodata and
//! occasionally a list in hand-written documents.

use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

pub(crate) fn split(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Ok(Some(split(&raw))),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(serde::de::Error::custom(format!(
                    "track_features entry must be a string, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(serde::de::Error::custom(format!(
            "track_features must be a string or list, got {other}"
        ))),
    }
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_opt(deserializer)?.unwrap_or_default())
}

#[allow(clippy::ptr_arg)]
pub(crate) fn serialize<S>(features: &Vec<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&features.join(" "))
}
