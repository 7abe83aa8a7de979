use serde::{Deserialize, Serialize};

/// Why a cache lookup did not produce a usable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMissReason {
    /// No extracted directory or no record file
    Absent,
    /// The record carries the stub corruption signature
    Corrupted,
    /// The record exists but could not be parsed
    Unreadable,
}

/// Package cache events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    Hit {
        package: String,
        path: String,
    },

    Miss {
        package: String,
        reason: CacheMissReason,
    },

    /// A record with the stub signature was found and will be rebuilt
    CorruptionDetected {
        package: String,
        path: String,
        signature: String,
    },

    /// A merged record was written to disk
    RecordWritten {
        package: String,
        path: String,
        provenance: String,
    },

    /// Result of a full scan over the cache
    VerificationCompleted {
        healthy: usize,
        corrupted: usize,
        missing: usize,
        unreadable: usize,
    },
}
