//! Integration tests for install crate

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sprig_errors::{Error, InstallError};
    use sprig_events::{channel, AppEvent, CacheEvent, GeneralEvent, PipelineEvent};
    use sprig_hash::ArtifactDigest;
    use sprig_install::*;
    use sprig_net::{Downloader, NetClient};
    use sprig_repodata::from_url;
    use sprig_store::{create_conda, create_tar_bz2, PackageCache};
    use sprig_types::{PackageInfo, REPODATA_RECORD_PATH};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::fs;

    const MANIFEST_SHA256: &str =
        "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

    struct Fixture {
        temp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                temp: tempdir().unwrap(),
            }
        }

        fn pkgs_dir(&self) -> PathBuf {
            self.temp.path().join("pkgs")
        }

        fn fetcher(&self) -> Arc<PackageFetcher> {
            let cache = Arc::new(PackageCache::new(self.pkgs_dir(), Duration::from_secs(5)));
            let downloader = Downloader::new(NetClient::with_defaults().unwrap(), BTreeMap::new());
            Arc::new(PackageFetcher::new(cache, Arc::new(downloader)))
        }

        /// Build `<temp>/channel/linux-64/<filename>` from a package tree
        async fn archive(&self, filename: &str, manifest: Option<serde_json::Value>) -> PathBuf {
            let src = self.temp.path().join("src").join(filename);
            fs::create_dir_all(src.join("lib")).await.unwrap();
            fs::write(src.join("lib").join("libdemo.so"), b"\x7fELF demo")
                .await
                .unwrap();
            fs::create_dir_all(src.join("info")).await.unwrap();
            if let Some(manifest) = manifest {
                fs::write(
                    src.join("info").join("index.json"),
                    serde_json::to_vec(&manifest).unwrap(),
                )
                .await
                .unwrap();
            }

            let out_dir = self.temp.path().join("channel").join("linux-64");
            fs::create_dir_all(&out_dir).await.unwrap();
            let out = out_dir.join(filename);
            if filename.ends_with(".conda") {
                create_conda(&src, &out).await.unwrap();
            } else {
                create_tar_bz2(&src, &out).await.unwrap();
            }
            out
        }
    }

    fn demo_manifest() -> serde_json::Value {
        json!({
            "name": "demo",
            "version": "1.0",
            "build": "h0_0",
            "build_number": 3,
            "subdir": "linux-64",
            "depends": ["libzlib >=1.3"],
            "constrains": ["python >=3.8"],
            "license": "MIT",
            "timestamp": 1_700_000_000u64,
            "md5": "00000000000000000000000000000000",
            "sha256": MANIFEST_SHA256
        })
    }

    fn file_url(path: &Path) -> String {
        url::Url::from_file_path(path).unwrap().to_string()
    }

    async fn model_for(archive: &Path) -> (PackageInfo, ArtifactDigest) {
        let digest = ArtifactDigest::from_file(archive).await.unwrap();
        let url = format!("{}#{}", file_url(archive), digest.md5);
        (from_url(&url).unwrap(), digest)
    }

    #[tokio::test]
    async fn test_conda_url_end_to_end() {
        let fixture = Fixture::new();
        let archive = fixture
            .archive("demo-1.0-h0_0.conda", Some(demo_manifest()))
            .await;
        let (model, digest) = model_for(&archive).await;

        let (tx, mut rx) = channel();
        let executor = FetchExecutor::new(fixture.fetcher(), 2);
        let context = FetchContext::new()
            .add_package(model.clone())
            .with_event_sender(tx);
        let report = executor.execute(&context).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.fetched(), 1);
        let outcome = report.results[0].outcome.as_ref().unwrap();
        assert!(!outcome.cached);

        let record = &outcome.entry.record;
        assert_eq!(record.depends, vec!["libzlib >=1.3"]);
        assert_eq!(record.constrains, vec!["python >=3.8"]);
        assert_eq!(record.license.as_deref(), Some("MIT"));
        assert_eq!(record.timestamp, Some(1_700_000_000));
        assert_eq!(record.build_number, 3);
        assert_eq!(record.md5, digest.md5);
        assert_eq!(record.sha256, digest.sha256);
        assert_ne!(record.sha256, MANIFEST_SHA256);
        assert_eq!(record.size, digest.size);
        assert!(record.size > 0);
        assert_eq!(record.url, model.url);
        assert_eq!(record.channel, model.channel);

        let dir = fixture.pkgs_dir().join("demo-1.0-h0_0");
        assert_eq!(outcome.entry.dir, dir);
        assert!(dir.join("lib").join("libdemo.so").exists());
        let on_disk: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.join(REPODATA_RECORD_PATH)).await.unwrap())
                .unwrap();
        assert_eq!(on_disk["depends"], json!(["libzlib >=1.3"]));
        assert!(on_disk.get("track_features").is_none());

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(events.iter().any(|m| matches!(
            m.event,
            AppEvent::Cache(CacheEvent::RecordWritten { .. })
        )));
        assert!(events.iter().any(|m| matches!(
            m.event,
            AppEvent::Pipeline(PipelineEvent::PackageReady { cached: false, .. })
        )));
    }

    #[tokio::test]
    async fn test_tar_bz2_without_manifest_degrades() {
        let fixture = Fixture::new();
        let archive = fixture.archive("bare-2.0-0.tar.bz2", None).await;
        let (model, digest) = model_for(&archive).await;

        let (tx, mut rx) = channel();
        let context = FetchContext::new().add_package(model).with_event_sender(tx);
        let report = FetchExecutor::new(fixture.fetcher(), 1)
            .execute(&context)
            .await
            .unwrap();

        let record = &report.results[0].outcome.as_ref().unwrap().entry.record;
        assert_eq!(record.name, "bare");
        assert_eq!(record.version, "2.0");
        assert!(record.depends.is_empty());
        assert!(record.constrains.is_empty());
        assert_eq!(record.license, None);
        assert_eq!(record.size, digest.size);

        let warned = std::iter::from_fn(|| rx.try_recv().ok())
            .any(|m| matches!(m.event, AppEvent::General(GeneralEvent::Warning { .. })));
        assert!(warned);
    }

    #[tokio::test]
    async fn test_second_run_is_served_from_cache() {
        let fixture = Fixture::new();
        let archive = fixture
            .archive("demo-1.0-h0_0.conda", Some(demo_manifest()))
            .await;
        let (model, _) = model_for(&archive).await;
        let context = FetchContext::new().add_package(model);

        let first = FetchExecutor::new(fixture.fetcher(), 1)
            .execute(&context)
            .await
            .unwrap();
        assert_eq!(first.fetched(), 1);

        // A fresh cache instance only sees what is on disk
        let second = FetchExecutor::new(fixture.fetcher(), 1)
            .execute(&context)
            .await
            .unwrap();
        assert_eq!(second.cached(), 1);
        assert_eq!(second.fetched(), 0);

        let forced = FetchExecutor::new(fixture.fetcher(), 1)
            .execute(&context.clone().with_force(true))
            .await
            .unwrap();
        assert_eq!(forced.fetched(), 1);
    }

    async fn corrupt_record(dir: &Path) {
        let path = dir.join(REPODATA_RECORD_PATH);
        let mut record: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).await.unwrap()).unwrap();
        record["license"] = json!("");
        record["timestamp"] = json!(0);
        record["depends"] = json!([]);
        fs::write(&path, serde_json::to_vec(&record).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_corrupted_record_is_fetched_again() {
        let fixture = Fixture::new();
        let archive = fixture
            .archive("demo-1.0-h0_0.conda", Some(demo_manifest()))
            .await;
        let (model, _) = model_for(&archive).await;
        let context = FetchContext::new().add_package(model);

        FetchExecutor::new(fixture.fetcher(), 1)
            .execute(&context)
            .await
            .unwrap();
        corrupt_record(&fixture.pkgs_dir().join("demo-1.0-h0_0")).await;

        let (tx, mut rx) = channel();
        let report = FetchExecutor::new(fixture.fetcher(), 1)
            .execute(&context.clone().with_event_sender(tx))
            .await
            .unwrap();

        let outcome = report.results[0].outcome.as_ref().unwrap();
        assert!(!outcome.cached);
        assert_eq!(outcome.entry.record.license.as_deref(), Some("MIT"));
        assert_eq!(outcome.entry.record.depends, vec!["libzlib >=1.3"]);

        let detected = std::iter::from_fn(|| rx.try_recv().ok()).any(|m| {
            matches!(
                m.event,
                AppEvent::Cache(CacheEvent::CorruptionDetected { .. })
            )
        });
        assert!(detected);
    }

    #[tokio::test]
    async fn test_repair_heals_in_place() {
        let fixture = Fixture::new();
        let archive = fixture
            .archive("demo-1.0-h0_0.conda", Some(demo_manifest()))
            .await;
        let (model, digest) = model_for(&archive).await;
        let fetcher = fixture.fetcher();

        FetchExecutor::new(fetcher.clone(), 1)
            .execute(&FetchContext::new().add_package(model.clone()))
            .await
            .unwrap();
        let dir = fixture.pkgs_dir().join("demo-1.0-h0_0");
        corrupt_record(&dir).await;

        let scope = PackageScope::new(None, model.identity());
        let entry = fetcher.repair("demo-1.0-h0_0", &scope).await.unwrap();

        assert_eq!(entry.record.license.as_deref(), Some("MIT"));
        assert_eq!(entry.record.timestamp, Some(1_700_000_000));
        assert_eq!(entry.record.depends, vec!["libzlib >=1.3"]);
        // Checksums are kept from the record, size from the kept archive
        assert_eq!(entry.record.md5, digest.md5);
        assert_eq!(entry.record.size, digest.size);

        let on_disk: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.join(REPODATA_RECORD_PATH)).await.unwrap())
                .unwrap();
        assert!(!sprig_guard::is_corrupted(&on_disk));
    }

    #[tokio::test]
    async fn test_repair_of_missing_entry_fails() {
        let fixture = Fixture::new();
        let scope = PackageScope::new(None, "ghost-1.0-0");
        let err = fixture
            .fetcher()
            .repair("ghost-1.0-0", &scope)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_unset_provenance_is_integrity_error_and_cleans_up() {
        let fixture = Fixture::new();
        let archive = fixture
            .archive("demo-1.0-h0_0.conda", Some(demo_manifest()))
            .await;
        let (model, _) = model_for(&archive).await;

        let mut value = serde_json::to_value(&model).unwrap();
        value.as_object_mut().unwrap().remove("provenance");
        let unset: PackageInfo = serde_json::from_value(value).unwrap();
        assert!(unset.provenance().is_none());

        let report = FetchExecutor::new(fixture.fetcher(), 1)
            .execute(&FetchContext::new().add_package(unset))
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        let err = report.results[0].outcome.as_ref().unwrap_err();
        assert!(err.is_integrity());
        assert!(!fixture.pkgs_dir().join("demo-1.0-h0_0").exists());
    }

    #[tokio::test]
    async fn test_failures_are_package_scoped() {
        let fixture = Fixture::new();
        let archive = fixture
            .archive("demo-1.0-h0_0.conda", Some(demo_manifest()))
            .await;
        let (good, _) = model_for(&archive).await;
        let missing = from_url(&file_url(
            &fixture.temp.path().join("channel/linux-64/gone-1.0-0.conda"),
        ))
        .unwrap();

        let (tx, mut rx) = channel();
        let context = FetchContext::new()
            .with_packages(vec![missing, good])
            .with_event_sender(tx);
        let report = FetchExecutor::new(fixture.fetcher(), 2)
            .execute(&context)
            .await
            .unwrap();

        assert_eq!(report.fetched(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        // Results keep input order
        assert_eq!(report.results[0].package, "gone-1.0-0");
        assert!(report.results[0].outcome.is_err());
        assert!(report.results[1].outcome.is_ok());

        let failed = std::iter::from_fn(|| rx.try_recv().ok()).any(|m| {
            matches!(
                m.event,
                AppEvent::Pipeline(PipelineEvent::PackageFailed { .. })
            )
        });
        assert!(failed);
    }

    #[tokio::test]
    async fn test_cancellation_stops_scheduling() {
        let fixture = Fixture::new();
        let archive = fixture
            .archive("demo-1.0-h0_0.conda", Some(demo_manifest()))
            .await;
        let (model, _) = model_for(&archive).await;

        let (tx, mut rx) = channel();
        let executor = FetchExecutor::new(fixture.fetcher(), 1);
        executor.cancellation_token().cancel();

        let context = FetchContext::new()
            .with_packages(vec![model.clone(), model])
            .with_event_sender(tx);
        let report = executor.execute(&context).await.unwrap();

        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert_eq!(report.skipped.len(), 2);
        assert!(!fixture.pkgs_dir().join("demo-1.0-h0_0").exists());

        let cancelled = std::iter::from_fn(|| rx.try_recv().ok()).any(|m| {
            matches!(
                m.event,
                AppEvent::Pipeline(PipelineEvent::Cancelled {
                    scheduled: 0,
                    pending: 2
                })
            )
        });
        assert!(cancelled);
    }

    #[tokio::test]
    async fn test_empty_context_is_rejected() {
        let fixture = Fixture::new();
        let err = FetchExecutor::new(fixture.fetcher(), 1)
            .execute(&FetchContext::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Install(InstallError::NoPackagesSpecified)
        ));
    }
}
