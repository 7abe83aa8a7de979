#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Artifact checksums for sprig
//!
//! Package records carry an md5 and a sha256 of the downloaded artifact.
//! Both are computed in one streaming pass together with the byte count.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sprig_errors::{Error, StorageError};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// Measured facts about an artifact on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactDigest {
    /// Lowercase hex md5
    pub md5: String,
    /// Lowercase hex sha256
    pub sha256: String,
    /// Size in bytes
    pub size: u64,
}

/// Running md5 + sha256 state
#[derive(Default)]
struct DualHasher {
    md5: Md5,
    sha256: Sha256,
    size: u64,
}

impl DualHasher {
    fn update(&mut self, chunk: &[u8]) {
        self.md5.update(chunk);
        self.sha256.update(chunk);
        self.size += chunk.len() as u64;
    }

    fn finish(self) -> ArtifactDigest {
        ArtifactDigest {
            md5: hex::encode(self.md5.finalize()),
            sha256: hex::encode(self.sha256.finalize()),
            size: self.size,
        }
    }
}

impl ArtifactDigest {
    /// Digest an in-memory buffer
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        let mut hasher = DualHasher::default();
        hasher.update(data);
        hasher.finish()
    }

    /// Digest a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub async fn from_file(path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, path))?;

        let mut hasher = DualHasher::default();
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::io_with_path(&e, path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(hasher.finish())
    }

    /// Digest data while copying it to a writer
    ///
    /// # Errors
    /// Returns an error if reading from the reader or writing to the writer fails.
    pub async fn hash_and_copy<R, W>(mut reader: R, mut writer: W) -> Result<Self, Error>
    where
        R: AsyncReadExt + Unpin,
        W: AsyncWriteExt + Unpin,
    {
        let mut hasher = DualHasher::default();
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            writer.write_all(&buffer[..n]).await?;
        }

        writer.flush().await?;
        Ok(hasher.finish())
    }

    /// Whether `expected` matches this digest's md5, ignoring case
    #[must_use]
    pub fn matches_md5(&self, expected: &str) -> bool {
        self.md5.eq_ignore_ascii_case(expected)
    }

    /// Whether `expected` matches this digest's sha256, ignoring case
    #[must_use]
    pub fn matches_sha256(&self, expected: &str) -> bool {
        self.sha256.eq_ignore_ascii_case(expected)
    }
}

/// Whether `s` looks like a hex digest of `bytes` bytes
#[must_use]
pub fn is_hex_digest(s: &str, bytes: usize) -> bool {
    s.len() == bytes * 2 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
