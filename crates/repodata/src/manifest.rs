//! Reading the manifest embedded in an extracted package

use sprig_types::{IndexJson, INDEX_JSON_PATH};
use std::path::Path;
use tracing::warn;

/// Result of reading `info/index.json`
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestRead {
    Parsed(IndexJson),
    /// The package ships no manifest
    Missing,
    /// The manifest exists but could not be parsed
    Malformed(String),
}

impl ManifestRead {
    /// The manifest, or an empty one when it was missing or malformed
    #[must_use]
    pub fn into_manifest(self) -> IndexJson {
        match self {
            Self::Parsed(manifest) => manifest,
            Self::Missing | Self::Malformed(_) => IndexJson::default(),
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Parsed(_))
    }
}

/// Read the manifest of an extracted package. Never fails: a missing or
/// malformed manifest degrades to an empty one and is logged.
pub async fn read_index_json(package_dir: &Path) -> ManifestRead {
    let path = package_dir.join(INDEX_JSON_PATH);
    match tokio::fs::read(&path).await {
        Ok(bytes) => match IndexJson::from_slice(&bytes) {
            Ok(manifest) => ManifestRead::Parsed(manifest),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed package manifest");
                ManifestRead::Malformed(e.to_string())
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "package ships no manifest");
            ManifestRead::Missing
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable package manifest");
            ManifestRead::Malformed(e.to_string())
        }
    }
}
