//! Fetch-extract pipeline for a single package
//!
//! Steps run strictly in order: locate, check the cache, lock, acquire,
//! extract, read the manifest, merge, persist, register. The cache lock is
//! held from acquisition until the entry is registered and released on every
//! exit path.

use crate::context::PackageScope;
use crate::guard::ExtractionGuard;
use sprig_errors::{Error, InstallError, PackageError, StorageError};
use sprig_events::{AppEvent, CacheEvent, CacheMissReason, EventEmitter};
use sprig_guard::{corruption_signature, inspect_record, RecordVerdict};
use sprig_hash::ArtifactDigest;
use sprig_net::{Fetcher, SourceLocator};
use sprig_repodata::{from_cache_record, merge, read_index_json, ManifestRead};
use sprig_store::{extract_package, CacheEntry, CacheLookup, PackageCache};
use sprig_types::{strip_archive_extension, IndexJson, PackageInfo, RepodataRecord};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A package that reached the cache
#[derive(Debug, Clone, PartialEq)]
pub struct PackageOutcome {
    pub entry: CacheEntry,
    /// Served from an existing healthy record without fetching
    pub cached: bool,
    /// Provenance of the model the pipeline was given
    pub provenance: String,
}

/// Runs the pipeline for one package at a time against a shared cache
pub struct PackageFetcher {
    cache: Arc<PackageCache>,
    fetcher: Arc<dyn Fetcher>,
}

impl std::fmt::Debug for PackageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageFetcher")
            .field("cache", &self.cache.root())
            .finish_non_exhaustive()
    }
}

impl PackageFetcher {
    #[must_use]
    pub fn new(cache: Arc<PackageCache>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { cache, fetcher }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<PackageCache> {
        &self.cache
    }

    /// Bring one package into the cache
    ///
    /// A healthy cached record is returned as-is unless `force` is set. A
    /// corrupted one is treated as a miss and the package is fetched again.
    /// Cancellation aborts a running download; an extraction in progress
    /// completes and is then discarded.
    ///
    /// # Errors
    ///
    /// Fails if the package has no usable URL, if acquisition or extraction
    /// fails, if the merge reports an integrity error, or if the record cannot
    /// be persisted. Integrity errors are returned unchanged.
    pub async fn process(
        &self,
        model: &PackageInfo,
        force: bool,
        scope: &PackageScope,
        cancel: &CancellationToken,
    ) -> Result<PackageOutcome, Error> {
        if model.url.is_empty() {
            return Err(InstallError::FetchFailed {
                package: scope.package().to_string(),
                message: "package has no source URL".to_string(),
            }
            .into());
        }
        let locator = SourceLocator::parse(&model.url)?;
        let filename = if model.filename.is_empty() {
            locator.filename().to_string()
        } else {
            model.filename.clone()
        };
        let basename = strip_archive_extension(&filename).to_string();
        let provenance = model
            .provenance()
            .map(|provenance| provenance.to_string())
            .unwrap_or_default();

        if !force {
            if let Some(entry) = self.check_cache(&basename, scope).await {
                return Ok(PackageOutcome {
                    entry,
                    cached: true,
                    provenance,
                });
            }
        }

        let _lock = self.cache.lock(&basename).await?;
        if !force {
            // Another process may have completed the entry while we waited
            if let CacheLookup::Hit(entry) = self.cache.lookup(&basename).await {
                debug!(package = %scope.package(), "entry completed by another holder");
                return Ok(PackageOutcome {
                    entry,
                    cached: true,
                    provenance,
                });
            }
        }

        let archive = self.cache.archive_path(&filename);
        let digest = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.fetcher.fetch(&locator, &archive) => result?,
        };

        self.cache.clear_entry(&basename).await?;
        let dir = self.cache.package_dir(&basename);
        let guard = ExtractionGuard::new(&dir);

        extract_package(&archive, &dir).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let manifest = read_manifest(&dir, scope).await;
        let record = merge(model, &manifest, Some(&digest))?;
        self.persist(&dir, &record, scope, &provenance).await?;

        guard.disarm();
        let entry = CacheEntry {
            basename,
            dir,
            record,
        };
        self.cache.register(entry.clone());

        Ok(PackageOutcome {
            entry,
            cached: false,
            provenance,
        })
    }

    /// Rebuild a cached entry's record from the record and its manifest
    ///
    /// A corrupted record becomes a URL-derived model whose stub fields the
    /// manifest supplies again. Size is measured from the kept archive when
    /// it is still present. Nothing is downloaded.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::EntryNotFound` if the entry has no record, a
    /// package error if the record cannot be read, and integrity or storage
    /// errors from the merge and the write.
    pub async fn repair(
        &self,
        basename: &str,
        scope: &PackageScope,
    ) -> Result<CacheEntry, Error> {
        let dir = self.cache.package_dir(basename);
        let _lock = self.cache.lock(basename).await?;

        let value = match inspect_record(&dir).await {
            RecordVerdict::Healthy(value) | RecordVerdict::Corrupted(value) => value,
            RecordVerdict::Missing => {
                return Err(StorageError::EntryNotFound {
                    key: basename.to_string(),
                }
                .into())
            }
            RecordVerdict::Unreadable(message) => {
                return Err(PackageError::InvalidRecord { message }.into())
            }
        };

        let model = from_cache_record(&value)?;
        let manifest = read_manifest(&dir, scope).await;
        let measured = match non_empty_filename(&model, &manifest) {
            Some(filename) => {
                let archive = self.cache.archive_path(&filename);
                ArtifactDigest::from_file(&archive).await.ok()
            }
            None => None,
        };

        let record = merge(&model, &manifest, measured.as_ref())?;
        let provenance = model
            .provenance()
            .map(|provenance| provenance.to_string())
            .unwrap_or_default();
        self.persist(&dir, &record, scope, &provenance).await?;
        info!(package = %record.identity(), "repaired cache entry");

        let entry = CacheEntry {
            basename: basename.to_string(),
            dir,
            record,
        };
        self.cache.register(entry.clone());
        Ok(entry)
    }

    async fn check_cache(&self, basename: &str, scope: &PackageScope) -> Option<CacheEntry> {
        let package = scope.package().to_string();
        match self.cache.lookup(basename).await {
            CacheLookup::Hit(entry) => {
                debug!(package = %package, "cache hit");
                scope.emit(AppEvent::Cache(CacheEvent::Hit {
                    package,
                    path: entry.dir.display().to_string(),
                }));
                Some(entry)
            }
            CacheLookup::Corrupted(record) => {
                let signature = corruption_signature(&record)
                    .map(|signature| signature.to_string())
                    .unwrap_or_default();
                warn!(
                    package = %package,
                    %signature,
                    "cached record is corrupted, fetching again"
                );
                scope.emit(AppEvent::Cache(CacheEvent::CorruptionDetected {
                    package: package.clone(),
                    path: self.cache.package_dir(basename).display().to_string(),
                    signature,
                }));
                scope.emit(AppEvent::Cache(CacheEvent::Miss {
                    package,
                    reason: CacheMissReason::Corrupted,
                }));
                None
            }
            CacheLookup::Absent => {
                scope.emit(AppEvent::Cache(CacheEvent::Miss {
                    package,
                    reason: CacheMissReason::Absent,
                }));
                None
            }
            CacheLookup::Unreadable(reason) => {
                warn!(
                    package = %package,
                    %reason,
                    "cached record is unreadable, fetching again"
                );
                scope.emit(AppEvent::Cache(CacheEvent::Miss {
                    package,
                    reason: CacheMissReason::Unreadable,
                }));
                None
            }
        }
    }

    async fn persist(
        &self,
        dir: &Path,
        record: &RepodataRecord,
        scope: &PackageScope,
        provenance: &str,
    ) -> Result<(), Error> {
        let path = self.cache.write_record(dir, record).await.map_err(|e| {
            InstallError::RecordWriteFailed {
                package: record.identity(),
                message: e.to_string(),
            }
        })?;
        scope.emit(AppEvent::Cache(CacheEvent::RecordWritten {
            package: record.identity(),
            path: path.display().to_string(),
            provenance: provenance.to_string(),
        }));
        Ok(())
    }
}

/// Read `info/index.json`, degrading to an empty manifest with a warning
async fn read_manifest(dir: &Path, scope: &PackageScope) -> IndexJson {
    let read = read_index_json(dir).await;
    match &read {
        ManifestRead::Parsed(_) => {}
        ManifestRead::Missing => scope.emit_warning_with_context(
            "package ships no manifest; merging against an empty one",
            scope.package(),
        ),
        ManifestRead::Malformed(reason) => scope.emit_warning_with_context(
            format!("malformed package manifest; merging against an empty one: {reason}"),
            scope.package(),
        ),
    }
    read.into_manifest()
}

fn non_empty_filename(model: &PackageInfo, manifest: &IndexJson) -> Option<String> {
    Some(model.filename.clone())
        .filter(|filename| !filename.is_empty())
        .or_else(|| manifest.filename.clone())
        .filter(|filename| !filename.is_empty())
}
