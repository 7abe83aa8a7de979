//! Integration tests for guard crate

#[cfg(test)]
mod tests {
    use sprig_guard::{inspect_record, RecordVerdict, VerificationStats};
    use tempfile::TempDir;

    async fn write_record(dir: &TempDir, contents: &str) {
        let info = dir.path().join("info");
        tokio::fs::create_dir_all(&info).await.unwrap();
        tokio::fs::write(info.join("repodata_record.json"), contents)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_verdicts_for_each_record_state() {
        let mut stats = VerificationStats::default();

        let missing = TempDir::new().unwrap();
        let verdict = inspect_record(missing.path()).await;
        assert_eq!(verdict, RecordVerdict::Missing);
        stats.record(&verdict);

        let healthy = TempDir::new().unwrap();
        write_record(
            &healthy,
            r#"{"name": "zlib", "license": "Zlib", "timestamp": 1700000000}"#,
        )
        .await;
        let verdict = inspect_record(healthy.path()).await;
        assert!(verdict.is_hit());
        stats.record(&verdict);

        let corrupted = TempDir::new().unwrap();
        write_record(&corrupted, r#"{"name": "zlib", "license": "", "timestamp": 0}"#).await;
        let verdict = inspect_record(corrupted.path()).await;
        assert!(matches!(verdict, RecordVerdict::Corrupted(_)));
        assert!(!verdict.is_hit());
        stats.record(&verdict);

        let garbage = TempDir::new().unwrap();
        write_record(&garbage, "[1, 2, 3]").await;
        let verdict = inspect_record(garbage.path()).await;
        assert!(matches!(verdict, RecordVerdict::Unreadable(_)));
        stats.record(&verdict);

        assert_eq!(stats.healthy, 1);
        assert_eq!(stats.stale(), 3);
        assert_eq!(stats.total(), 4);
    }

    #[tokio::test]
    async fn test_inspection_does_not_touch_the_record() {
        let dir = TempDir::new().unwrap();
        let original = r#"{"name": "zlib", "license": "", "timestamp": 0}"#;
        write_record(&dir, original).await;

        let _ = inspect_record(dir.path()).await;

        let after = tokio::fs::read_to_string(dir.path().join("info/repodata_record.json"))
            .await
            .unwrap();
        assert_eq!(after, original);
    }
}
