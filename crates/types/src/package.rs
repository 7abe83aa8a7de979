//! Package metadata model and the documents it is built from

use crate::provenance::{Provenance, SourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One package's metadata at any point before it is persisted.
///
/// Text fields that the source did not supply are empty; every other field
/// is `None` when absent. Provenance is fixed by the constructor and has no
/// setter. A model deserialized without one is rejected by the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub build: String,
    #[serde(default)]
    pub build_number: Option<u64>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub subdir: String,
    #[serde(default, rename = "fn")]
    pub filename: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub license_family: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub depends: Option<Vec<String>>,
    #[serde(default)]
    pub constrains: Option<Vec<String>>,
    #[serde(default)]
    pub track_features: Option<Vec<String>>,
    #[serde(default)]
    pub noarch: Option<String>,
    #[serde(default)]
    pub python_site_packages_path: Option<String>,
    /// Keys outside the typed set, carried through to the record
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    #[serde(default)]
    provenance: Option<Provenance>,
    source: SourceKind,
}

impl PackageInfo {
    /// Create an otherwise empty model with its provenance fixed
    pub fn new(name: impl Into<String>, source: SourceKind, provenance: Provenance) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            build: String::new(),
            build_number: None,
            channel: String::new(),
            subdir: String::new(),
            filename: String::new(),
            url: String::new(),
            md5: None,
            sha256: None,
            size: None,
            license: None,
            license_family: None,
            timestamp: None,
            depends: None,
            constrains: None,
            track_features: None,
            noarch: None,
            python_site_packages_path: None,
            extra: BTreeMap::new(),
            provenance: Some(provenance),
            source,
        }
    }

    /// Provenance assigned at construction; `None` only for models that were
    /// deserialized from a document that lacked it
    #[must_use]
    pub fn provenance(&self) -> Option<Provenance> {
        self.provenance
    }

    #[must_use]
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Copy every key the document carries onto the model. The document's
    /// `name` is ignored; a model's name is fixed at construction.
    pub fn absorb(&mut self, doc: IndexJson) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        set(&mut self.version, doc.version);
        set(&mut self.build, doc.build);
        set(&mut self.channel, doc.channel);
        set(&mut self.subdir, doc.subdir);
        set(&mut self.filename, doc.filename);
        set(&mut self.url, doc.url);
        fill(&mut self.build_number, doc.build_number);
        fill(&mut self.md5, doc.md5);
        fill(&mut self.sha256, doc.sha256);
        fill(&mut self.size, doc.size);
        fill(&mut self.license, doc.license);
        fill(&mut self.license_family, doc.license_family);
        fill(&mut self.timestamp, doc.timestamp);
        fill(&mut self.depends, doc.depends);
        fill(&mut self.constrains, doc.constrains);
        fill(&mut self.track_features, doc.track_features);
        fill(&mut self.noarch, doc.noarch);
        fill(&mut self.python_site_packages_path, doc.python_site_packages_path);
        self.extra.extend(doc.extra);
    }

    /// The model's metadata as a document, without provenance
    #[must_use]
    pub fn to_document(&self) -> IndexJson {
        let text = |value: &str| (!value.is_empty()).then(|| value.to_string());
        IndexJson {
            name: text(&self.name),
            version: text(&self.version),
            build: text(&self.build),
            build_number: self.build_number,
            channel: text(&self.channel),
            subdir: text(&self.subdir),
            filename: text(&self.filename),
            url: text(&self.url),
            md5: self.md5.clone(),
            sha256: self.sha256.clone(),
            size: self.size,
            license: self.license.clone(),
            license_family: self.license_family.clone(),
            timestamp: self.timestamp,
            depends: self.depends.clone(),
            constrains: self.constrains.clone(),
            track_features: self.track_features.clone(),
            noarch: self.noarch.clone(),
            python_site_packages_path: self.python_site_packages_path.clone(),
            extra: self.extra.clone(),
        }
    }

    /// `name-version-build`, used to identify the package in errors and events
    #[must_use]
    pub fn identity(&self) -> String {
        PackageKey::from(self).to_string()
    }
}

/// Identity of a package in the cache and in logs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
    pub build: String,
}

impl From<&PackageInfo> for PackageKey {
    fn from(info: &PackageInfo) -> Self {
        Self {
            name: info.name.clone(),
            version: info.version.clone(),
            build: info.build.clone(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.build)
    }
}

/// Package metadata document in the `index.json` shape.
///
/// Used for the manifest embedded in an artifact, for channel index entries
/// and for previously persisted records. Every key is optional; unknown keys
/// are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexJson {
    pub name: Option<String>,
    pub version: Option<String>,
    pub build: Option<String>,
    pub build_number: Option<u64>,
    pub channel: Option<String>,
    pub subdir: Option<String>,
    #[serde(rename = "fn")]
    pub filename: Option<String>,
    pub url: Option<String>,
    pub md5: Option<String>,
    pub sha256: Option<String>,
    pub size: Option<u64>,
    pub license: Option<String>,
    pub license_family: Option<String>,
    pub timestamp: Option<u64>,
    pub depends: Option<Vec<String>>,
    pub constrains: Option<Vec<String>>,
    #[serde(
        deserialize_with = "crate::features::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub track_features: Option<Vec<String>>,
    #[serde(deserialize_with = "deserialize_noarch")]
    pub noarch: Option<String>,
    pub python_site_packages_path: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IndexJson {
    /// Parse a document, rejecting anything that is not a JSON object of the
    /// expected shape
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// `noarch` is a string in current packages and a boolean in very old ones
fn deserialize_noarch<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(kind)) if !kind.is_empty() => Some(kind),
        Some(Value::Bool(true)) => Some("generic".to_string()),
        _ => None,
    })
}
