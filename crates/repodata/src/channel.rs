//! Models built from channel repository index entries

use serde::Deserialize;
use sprig_errors::{Error, PackageError};
use sprig_types::{IndexJson, PackageFilename, PackageInfo, Provenance, SourceKind};
use std::collections::BTreeMap;

/// One subdir's `repodata.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelRepodata {
    pub info: Option<RepodataInfo>,
    pub packages: BTreeMap<String, IndexJson>,
    #[serde(rename = "packages.conda")]
    pub conda_packages: BTreeMap<String, IndexJson>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RepodataInfo {
    pub subdir: Option<String>,
}

impl ChannelRepodata {
    /// Parse a `repodata.json` document
    ///
    /// # Errors
    ///
    /// Returns `PackageError::InvalidIndexEntry` if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| {
            PackageError::InvalidIndexEntry {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Build a channel-authoritative model for every entry
    ///
    /// # Errors
    ///
    /// Returns the first entry that cannot be converted.
    pub fn into_models(self, channel: &str, subdir: &str) -> Result<Vec<PackageInfo>, Error> {
        let subdir = self
            .info
            .and_then(|info| info.subdir)
            .unwrap_or_else(|| subdir.to_string());

        self.packages
            .into_iter()
            .chain(self.conda_packages)
            .map(|(filename, entry)| from_channel_index(channel, &subdir, &filename, entry))
            .collect()
    }
}

/// Build a model from one (possibly patched) repository index entry.
///
/// Everything the entry carries is authoritative, including empty
/// `depends`/`constrains` lists. Keys the entry lacks stay absent so the
/// manifest can fill them later.
///
/// # Errors
///
/// Returns `PackageError::InvalidIndexEntry` if neither the entry nor the
/// file name yields a package name.
pub fn from_channel_index(
    channel: &str,
    subdir: &str,
    filename: &str,
    mut entry: IndexJson,
) -> Result<PackageInfo, Error> {
    let parsed = PackageFilename::parse(filename).ok();

    let name = entry
        .name
        .take()
        .filter(|name| !name.is_empty())
        .or_else(|| parsed.as_ref().map(|p| p.name.clone()))
        .ok_or_else(|| PackageError::InvalidIndexEntry {
            message: format!("entry {filename} has no package name"),
        })?;

    let channel = channel.trim_end_matches('/');
    let subdir = entry
        .subdir
        .take()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| subdir.to_string());

    let mut info = PackageInfo::new(
        name,
        SourceKind::ChannelIndex,
        Provenance::ChannelAuthoritative,
    );
    info.version = entry
        .version
        .take()
        .or_else(|| parsed.as_ref().map(|p| p.version.clone()))
        .unwrap_or_default();
    info.build = entry
        .build
        .take()
        .or_else(|| parsed.as_ref().map(|p| p.build.clone()))
        .unwrap_or_default();
    info.channel = entry
        .channel
        .take()
        .unwrap_or_else(|| channel.to_string());
    info.url = entry
        .url
        .take()
        .unwrap_or_else(|| format!("{channel}/{subdir}/{filename}"));
    info.subdir = subdir;
    info.filename = filename.to_string();
    info.absorb(entry);

    Ok(info)
}
