use serde::{Deserialize, Serialize};

use crate::EventSource;
use sprig_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code (`integrity.unknown_tag`, `network.timeout`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod acquisition;
pub mod cache;
pub mod general;
pub mod pipeline;

pub use acquisition::*;
pub use cache::*;
pub use general::*;
pub use pipeline::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Artifact downloads
    Acquisition(AcquisitionEvent),

    /// Package cache lookups, integrity checks and record writes
    Cache(CacheEvent),

    /// Batch-level fetch progress
    Pipeline(PipelineEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Acquisition(_) => EventSource::ACQUISITION,
            Self::Cache(_) => EventSource::CACHE,
            Self::Pipeline(_) => EventSource::PIPELINE,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Acquisition(AcquisitionEvent::Failed { .. })
            | Self::Pipeline(PipelineEvent::PackageFailed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Acquisition(AcquisitionEvent::Retrying { .. })
            | Self::Cache(CacheEvent::CorruptionDetected { .. })
            | Self::Pipeline(PipelineEvent::Cancelled { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Cache(CacheEvent::Hit { .. } | CacheEvent::Miss { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }
}
