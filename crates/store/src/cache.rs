//! Package cache: extracted directories plus their canonical records

use crate::lock::CacheLock;
use dashmap::DashMap;
use serde_json::Value;
use sprig_errors::{Error, StorageError};
use sprig_guard::{inspect_record, RecordVerdict, VerificationStats};
use sprig_types::{RepodataRecord, REPODATA_RECORD_PATH};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// Directory holding per-entry lock files, skipped by scans
const LOCK_DIR: &str = ".locks";

/// One usable cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Archive file name without extension; also the directory name
    pub basename: String,
    pub dir: PathBuf,
    pub record: RepodataRecord,
}

/// Result of looking a package up in the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CacheEntry),
    /// The record carries a corruption signature; it is kept on disk but
    /// must be re-derived
    Corrupted(Value),
    /// No extracted directory or no record
    Absent,
    /// A record exists but cannot be used
    Unreadable(String),
}

/// Outcome of [`PackageCache::verify_all`]
#[derive(Debug, Clone, Default)]
pub struct CacheReport {
    pub stats: VerificationStats,
    /// Every scanned entry with its verdict, sorted by basename
    pub entries: Vec<(String, RecordVerdict)>,
}

/// Package cache rooted at `pkgs_dir`
///
/// The in-memory index is shared between concurrent pipelines. Writes to one
/// key go through the map's shard lock, so registrations of the same package
/// are serialized.
#[derive(Debug)]
pub struct PackageCache {
    root: PathBuf,
    lock_timeout: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl PackageCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            lock_timeout,
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extraction directory for a package basename
    #[must_use]
    pub fn package_dir(&self, basename: &str) -> PathBuf {
        self.root.join(basename)
    }

    /// Where the downloaded archive is kept
    #[must_use]
    pub fn archive_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Take the cross-process lock for one entry
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lock cannot be taken within the
    /// configured timeout.
    pub async fn lock(&self, basename: &str) -> Result<CacheLock, Error> {
        let path = self.root.join(LOCK_DIR).join(format!("{basename}.lock"));
        CacheLock::acquire(&path, self.lock_timeout).await
    }

    /// Look up a package by basename
    ///
    /// Entries already registered in this process are served from memory.
    /// Otherwise the on-disk record is inspected; a corrupted record is
    /// reported as such and never served.
    pub async fn lookup(&self, basename: &str) -> CacheLookup {
        if let Some(entry) = self.entries.get(basename) {
            return CacheLookup::Hit(entry.value().clone());
        }

        let dir = self.package_dir(basename);
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return CacheLookup::Absent;
        }

        match inspect_record(&dir).await {
            RecordVerdict::Healthy(value) => match RepodataRecord::from_cached(value) {
                Ok(record) => {
                    let entry = CacheEntry {
                        basename: basename.to_string(),
                        dir,
                        record,
                    };
                    self.entries.insert(basename.to_string(), entry.clone());
                    CacheLookup::Hit(entry)
                }
                Err(e) => CacheLookup::Unreadable(e.to_string()),
            },
            RecordVerdict::Corrupted(value) => CacheLookup::Corrupted(value),
            RecordVerdict::Missing => CacheLookup::Absent,
            RecordVerdict::Unreadable(reason) => CacheLookup::Unreadable(reason),
        }
    }

    /// Remove an entry's extraction directory and forget it
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub async fn clear_entry(&self, basename: &str) -> Result<(), Error> {
        self.entries.remove(basename);
        let dir = self.package_dir(basename);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(dir = %dir.display(), "removed existing cache directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io_with_path(&e, &dir)),
        }
    }

    /// Persist `record` at `info/repodata_record.json` inside `dir`
    ///
    /// The file is written next to its final name and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, the write or the rename fails.
    pub async fn write_record(
        &self,
        dir: &Path,
        record: &RepodataRecord,
    ) -> Result<PathBuf, Error> {
        let path = dir.join(REPODATA_RECORD_PATH);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        let json = record.to_json_pretty()?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| Error::io_with_path(&e, &tmp))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::AtomicRenameFailed {
                message: format!("{} -> {}: {e}", tmp.display(), path.display()),
            })?;

        Ok(path)
    }

    /// Add or replace an entry in the index, returning the previous one
    pub fn register(&self, entry: CacheEntry) -> Option<CacheEntry> {
        info!(
            package = %entry.record.identity(),
            dir = %entry.dir.display(),
            "registered cache entry"
        );
        self.entries.insert(entry.basename.clone(), entry)
    }

    #[must_use]
    pub fn entry(&self, basename: &str) -> Option<CacheEntry> {
        self.entries.get(basename).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inspect every extracted directory under the cache root
    ///
    /// Nothing is modified; stale entries are only reported. An entry is
    /// healthy exactly when [`PackageCache::lookup`] would serve it.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache root cannot be listed.
    pub async fn verify_all(&self) -> Result<CacheReport, Error> {
        let mut report = CacheReport::default();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(Error::io_with_path(&e, &self.root)),
        };

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type().await?.is_dir() {
                continue;
            }
            let verdict = match inspect_record(&entry.path()).await {
                // Same reading as `lookup`, so a healthy entry is always a hit
                RecordVerdict::Healthy(value) => {
                    match RepodataRecord::from_cached(value.clone()) {
                        Ok(_) => RecordVerdict::Healthy(value),
                        Err(e) => RecordVerdict::Unreadable(e.to_string()),
                    }
                }
                verdict => verdict,
            };
            report.stats.record(&verdict);
            report.entries.push((name, verdict));
        }

        report.entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(report)
    }
}
