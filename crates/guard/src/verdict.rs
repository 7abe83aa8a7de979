//! Inspection of the record stored in a cache entry

use crate::corruption::corruption_signature;
use serde_json::Value;
use sprig_types::REPODATA_RECORD_PATH;
use std::path::Path;
use tracing::{debug, warn};

/// Outcome of inspecting one cache entry's record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordVerdict {
    /// The record is usable as-is
    Healthy(Value),
    /// The record carries a known corruption signature
    Corrupted(Value),
    /// The entry has no record file
    Missing,
    /// The record file exists but is not a JSON object
    Unreadable(String),
}

impl RecordVerdict {
    /// Whether a lookup may serve this entry
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Healthy(_))
    }
}

/// Read and classify `<package_dir>/info/repodata_record.json`
pub async fn inspect_record(package_dir: &Path) -> RecordVerdict {
    let path = package_dir.join(REPODATA_RECORD_PATH);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return RecordVerdict::Missing,
        Err(e) => return RecordVerdict::Unreadable(e.to_string()),
    };

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => return RecordVerdict::Unreadable("record is not a JSON object".to_string()),
        Err(e) => return RecordVerdict::Unreadable(e.to_string()),
    };

    if let Some(signature) = corruption_signature(&value) {
        warn!(
            path = %path.display(),
            %signature,
            "cached record carries a corruption signature"
        );
        RecordVerdict::Corrupted(value)
    } else {
        debug!(path = %path.display(), "cached record is healthy");
        RecordVerdict::Healthy(value)
    }
}

/// Tally of verdicts across a verification sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationStats {
    pub healthy: usize,
    pub corrupted: usize,
    pub missing: usize,
    pub unreadable: usize,
}

impl VerificationStats {
    pub fn record(&mut self, verdict: &RecordVerdict) {
        match verdict {
            RecordVerdict::Healthy(_) => self.healthy += 1,
            RecordVerdict::Corrupted(_) => self.corrupted += 1,
            RecordVerdict::Missing => self.missing += 1,
            RecordVerdict::Unreadable(_) => self.unreadable += 1,
        }
    }

    /// Entries that will be re-derived on next use
    #[must_use]
    pub fn stale(&self) -> usize {
        self.corrupted + self.missing + self.unreadable
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.healthy + self.stale()
    }
}
