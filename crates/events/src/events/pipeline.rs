use serde::{Deserialize, Serialize};

/// Fetch-extract pipeline events for a whole batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        total: usize,
        concurrency: usize,
    },

    /// One package reached the cache (fetched now or already present)
    PackageReady {
        package: String,
        cached: bool,
        provenance: String,
    },

    PackageFailed {
        package: String,
        failure: super::FailureContext,
    },

    /// Cancellation observed; no further packages are scheduled
    Cancelled {
        scheduled: usize,
        pending: usize,
    },

    Completed {
        fetched: usize,
        cached: usize,
        failed: usize,
        duration_ms: u64,
    },
}
