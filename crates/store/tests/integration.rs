//! Integration tests for store crate

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sprig_guard::RecordVerdict;
    use sprig_store::*;
    use sprig_types::{RepodataRecord, REPODATA_RECORD_PATH};
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::fs;

    fn sample_record() -> RepodataRecord {
        serde_json::from_value(json!({
            "name": "demo",
            "version": "1.0",
            "build": "h0_0",
            "build_number": 0,
            "channel": "https://conda.example.com/main",
            "subdir": "linux-64",
            "fn": "demo-1.0-h0_0.conda",
            "url": "https://conda.example.com/main/linux-64/demo-1.0-h0_0.conda",
            "md5": "5eb63bbbe01eeed093cb22bb8f5acdc3",
            "sha256": "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
            "size": 11,
            "depends": ["libzlib >=1.3"],
            "constrains": [],
            "license": "MIT",
            "timestamp": 1_700_000_000u64
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_written_record_is_a_hit() {
        let temp = tempdir().unwrap();
        let cache = PackageCache::new(temp.path(), Duration::from_secs(1));
        let dir = cache.package_dir("demo-1.0-h0_0");

        let record = sample_record();
        let path = cache.write_record(&dir, &record).await.unwrap();
        assert_eq!(path, dir.join(REPODATA_RECORD_PATH));
        assert!(!dir.join("info/repodata_record.json.tmp").exists());

        match cache.lookup("demo-1.0-h0_0").await {
            CacheLookup::Hit(entry) => {
                assert_eq!(entry.record, record);
                assert_eq!(entry.dir, dir);
            }
            other => panic!("expected hit, got {other:?}"),
        }
        // Healthy disk hits are indexed
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_record_is_never_served() {
        let temp = tempdir().unwrap();
        let cache = PackageCache::new(temp.path(), Duration::from_secs(1));
        let dir = cache.package_dir("demo-1.0-h0_0");
        fs::create_dir_all(dir.join("info")).await.unwrap();

        let mut stale = serde_json::to_value(sample_record()).unwrap();
        stale["license"] = json!("");
        stale["timestamp"] = json!(0);
        stale["depends"] = json!([]);
        fs::write(
            dir.join(REPODATA_RECORD_PATH),
            serde_json::to_vec(&stale).unwrap(),
        )
        .await
        .unwrap();

        match cache.lookup("demo-1.0-h0_0").await {
            CacheLookup::Corrupted(value) => assert_eq!(value, stale),
            other => panic!("expected corrupted, got {other:?}"),
        }
        assert!(cache.is_empty());
        // The monitor never deletes
        assert!(dir.join(REPODATA_RECORD_PATH).exists());
    }

    #[tokio::test]
    async fn test_absent_and_unreadable() {
        let temp = tempdir().unwrap();
        let cache = PackageCache::new(temp.path(), Duration::from_secs(1));
        assert_eq!(cache.lookup("nothing-1.0-0").await, CacheLookup::Absent);

        let dir = cache.package_dir("broken-1.0-0");
        fs::create_dir_all(dir.join("info")).await.unwrap();
        assert_eq!(cache.lookup("broken-1.0-0").await, CacheLookup::Absent);

        fs::write(dir.join(REPODATA_RECORD_PATH), b"{ not json")
            .await
            .unwrap();
        assert!(matches!(
            cache.lookup("broken-1.0-0").await,
            CacheLookup::Unreadable(_)
        ));
    }

    #[tokio::test]
    async fn test_register_and_clear() {
        let temp = tempdir().unwrap();
        let cache = PackageCache::new(temp.path(), Duration::from_secs(1));
        let dir = cache.package_dir("demo-1.0-h0_0");
        fs::create_dir_all(&dir).await.unwrap();

        let entry = CacheEntry {
            basename: "demo-1.0-h0_0".to_string(),
            dir: dir.clone(),
            record: sample_record(),
        };
        assert!(cache.register(entry.clone()).is_none());
        assert_eq!(cache.register(entry.clone()), Some(entry.clone()));
        assert_eq!(cache.entry("demo-1.0-h0_0"), Some(entry));

        cache.clear_entry("demo-1.0-h0_0").await.unwrap();
        assert!(!dir.exists());
        assert!(cache.entry("demo-1.0-h0_0").is_none());
        // Clearing twice is fine
        cache.clear_entry("demo-1.0-h0_0").await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_all_reports_every_entry() {
        let temp = tempdir().unwrap();
        let cache = PackageCache::new(temp.path(), Duration::from_secs(1));

        cache
            .write_record(&cache.package_dir("good-1.0-0"), &sample_record())
            .await
            .unwrap();

        let bad = cache.package_dir("bad-1.0-0");
        fs::create_dir_all(bad.join("info")).await.unwrap();
        fs::write(
            bad.join(REPODATA_RECORD_PATH),
            br#"{"name":"bad","timestamp":0,"license":""}"#,
        )
        .await
        .unwrap();

        fs::create_dir_all(cache.package_dir("empty-1.0-0"))
            .await
            .unwrap();
        // Lock files and downloaded archives are not entries
        let _lock = cache.lock("good-1.0-0").await.unwrap();
        fs::write(temp.path().join("good-1.0-0.conda"), b"archive")
            .await
            .unwrap();

        let report = cache.verify_all().await.unwrap();
        assert_eq!(report.stats.total(), 3);
        assert_eq!(report.stats.healthy, 1);
        assert_eq!(report.stats.corrupted, 1);
        assert_eq!(report.stats.missing, 1);

        let names: Vec<_> = report.entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["bad-1.0-0", "empty-1.0-0", "good-1.0-0"]);
        assert!(matches!(report.entries[0].1, RecordVerdict::Corrupted(_)));
    }

    #[tokio::test]
    async fn test_lookup_and_verify_agree_on_older_records() {
        let temp = tempdir().unwrap();
        let cache = PackageCache::new(temp.path(), Duration::from_secs(1));

        // Written before `constrains` and `sha256` were always emitted
        let mut older = serde_json::to_value(sample_record()).unwrap();
        let object = older.as_object_mut().unwrap();
        object.remove("constrains");
        object.remove("sha256");
        let dir = cache.package_dir("demo-1.0-h0_0");
        fs::create_dir_all(dir.join("info")).await.unwrap();
        fs::write(
            dir.join(REPODATA_RECORD_PATH),
            serde_json::to_vec(&older).unwrap(),
        )
        .await
        .unwrap();

        // A record with a mistyped key is unreadable to both
        let mistyped = cache.package_dir("mistyped-1.0-0");
        fs::create_dir_all(mistyped.join("info")).await.unwrap();
        fs::write(
            mistyped.join(REPODATA_RECORD_PATH),
            br#"{"name":"mistyped","version":"1.0","build":"0","depends":"zlib"}"#,
        )
        .await
        .unwrap();

        let report = cache.verify_all().await.unwrap();
        assert_eq!(report.stats.healthy, 1);
        assert_eq!(report.stats.unreadable, 1);

        match cache.lookup("demo-1.0-h0_0").await {
            CacheLookup::Hit(entry) => {
                assert!(entry.record.constrains.is_empty());
                assert_eq!(entry.record.sha256, "");
                assert_eq!(entry.record.depends, sample_record().depends);
            }
            other => panic!("expected hit, got {other:?}"),
        }
        assert!(matches!(
            cache.lookup("mistyped-1.0-0").await,
            CacheLookup::Unreadable(_)
        ));
    }
}
