//! Models rebuilt from previously persisted records

use serde_json::Value;
use sprig_errors::{Error, PackageError};
use sprig_guard::is_corrupted;
use sprig_types::{IndexJson, PackageInfo, Provenance, SourceKind};
use tracing::info;

/// Rebuild a model from a record found in the package cache.
///
/// A healthy record is the output of an earlier merge and is authoritative.
/// A record carrying the corruption signature holds stub values where the
/// manifest should have won; it is classified URL-derived with the healing
/// row so that the next merge takes those fields from the manifest again.
///
/// # Errors
///
/// Returns `PackageError::InvalidRecord` if the record is not an object of the
/// expected shape or has no name.
pub fn from_cache_record(record: &Value) -> Result<PackageInfo, Error> {
    let corrupted = is_corrupted(record);
    let mut entry: IndexJson =
        serde_json::from_value(record.clone()).map_err(|e| PackageError::InvalidRecord {
            message: e.to_string(),
        })?;

    let name = entry
        .name
        .take()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| PackageError::InvalidRecord {
            message: "record has no name".to_string(),
        })?;

    let (source, provenance) = if corrupted {
        info!(package = %name, "healing corrupted cache record");
        (
            SourceKind::HealedCacheRecord,
            Provenance::url_derived(SourceKind::HealedCacheRecord),
        )
    } else {
        (SourceKind::CachedRecord, Provenance::ChannelAuthoritative)
    };

    let mut info = PackageInfo::new(name, source, provenance);
    info.absorb(entry);

    Ok(info)
}
