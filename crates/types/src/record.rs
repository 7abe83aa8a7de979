//! Canonical repodata record persisted as `info/repodata_record.json`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Location of the record inside an extracted package directory
pub const REPODATA_RECORD_PATH: &str = "info/repodata_record.json";

/// Location of the manifest the package ships with
pub const INDEX_JSON_PATH: &str = "info/index.json";

/// Required keys that may be missing from records on disk
const CACHED_DEFAULTS: &[&str] = &[
    "build_number",
    "channel",
    "subdir",
    "fn",
    "url",
    "md5",
    "sha256",
    "size",
    "depends",
    "constrains",
];

/// Final, normalized metadata for one cached package.
///
/// The required keys are always written. `license`, `license_family` and
/// `timestamp` are written only when known, `track_features` only when
/// non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepodataRecord {
    pub name: String,
    pub version: String,
    pub build: String,
    pub build_number: u64,
    pub channel: String,
    pub subdir: String,
    #[serde(rename = "fn")]
    pub filename: String,
    pub url: String,
    pub md5: String,
    pub sha256: String,
    pub size: u64,
    pub depends: Vec<String>,
    pub constrains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "crate::features::serialize",
        deserialize_with = "crate::features::deserialize"
    )]
    pub track_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noarch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_site_packages_path: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RepodataRecord {
    /// Serialize with keys in sorted order so equal records are
    /// byte-identical on disk
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let value = self.to_value()?;
        serde_json::to_string_pretty(&value)
    }

    /// Record as a JSON object with sorted keys
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        // serde_json's map is ordered by key
        serde_json::to_value(self)
    }

    /// Read a record written by any installer version
    ///
    /// Older writers omit keys this record always carries, such as
    /// `constrains`. Absent or null keys take their empty value; present keys
    /// must still have the right type.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if `value` is not an object
    /// or a key has the wrong type.
    pub fn from_cached(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(object) = &mut value {
            for key in CACHED_DEFAULTS {
                let slot = object.entry(*key).or_insert(Value::Null);
                if slot.is_null() {
                    *slot = match *key {
                        "build_number" | "size" => Value::from(0),
                        "depends" | "constrains" => Value::Array(Vec::new()),
                        _ => Value::from(""),
                    };
                }
            }
        }
        serde_json::from_value(value)
    }

    /// `name-version-build`
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build)
    }
}
