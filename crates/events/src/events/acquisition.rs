use serde::{Deserialize, Serialize};

/// Artifact acquisition events, one stream per package URL
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcquisitionEvent {
    /// Download of an artifact started
    Started {
        package: String,
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mirror: Option<String>,
    },

    /// A transient failure is being retried
    Retrying {
        url: String,
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },

    /// Artifact is on disk and its digest has been measured
    Completed {
        package: String,
        url: String,
        size: u64,
        sha256: String,
    },

    Failed {
        package: String,
        url: String,
        failure: super::FailureContext,
    },
}
