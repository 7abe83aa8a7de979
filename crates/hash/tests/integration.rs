//! Integration tests for hash crate

#[cfg(test)]
mod tests {
    use sprig_hash::*;
    use tempfile::tempdir;
    use tokio::fs;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_large_file_spans_chunks() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("archive.conda");

        // Larger than one read buffer so the digest is built incrementally
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut file = fs::File::create(&file_path).await.unwrap();
        file.write_all(&data).await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let digest = ArtifactDigest::from_file(&file_path).await.unwrap();
        assert_eq!(digest, ArtifactDigest::from_data(&data));
        assert_eq!(digest.size, 200_000);
        assert!(is_hex_digest(&digest.md5, 16));
        assert!(is_hex_digest(&digest.sha256, 32));
    }

    #[tokio::test]
    async fn test_copy_digest_matches_written_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("copy.tar.bz2");
        let data = b"package bytes".to_vec();

        let output = fs::File::create(&target).await.unwrap();
        let digest = ArtifactDigest::hash_and_copy(data.as_slice(), output)
            .await
            .unwrap();

        let on_disk = ArtifactDigest::from_file(&target).await.unwrap();
        assert_eq!(digest, on_disk);
        assert!(on_disk.matches_sha256(&digest.sha256.to_uppercase()));
        assert!(!on_disk.matches_md5("0".repeat(32).as_str()));
    }

    #[test]
    fn test_empty_input() {
        let digest = ArtifactDigest::from_data(b"");
        assert_eq!(digest.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            digest.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(digest.size, 0);
    }
}
