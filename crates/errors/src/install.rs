//! Fetch pipeline error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum InstallError {
    #[error("fetching {package} failed: {message}")]
    FetchFailed { package: String, message: String },

    #[error("extraction failed for {package}: {message}")]
    ExtractionFailed { package: String, message: String },

    #[error("writing the record for {package} failed: {message}")]
    RecordWriteFailed { package: String, message: String },

    #[error("no packages specified")]
    NoPackagesSpecified,

    #[error("task execution failed: {message}")]
    TaskError { message: String },

    #[error("concurrency error: {message}")]
    ConcurrencyError { message: String },
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoPackagesSpecified => Some("Pass at least one package URL or lockfile."),
            Self::ExtractionFailed { .. } => Some("The archive may be truncated; fetch it again."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::TaskError { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::FetchFailed { .. } => "install.fetch_failed",
            Self::ExtractionFailed { .. } => "install.extraction_failed",
            Self::RecordWriteFailed { .. } => "install.record_write_failed",
            Self::NoPackagesSpecified => "install.no_packages",
            Self::TaskError { .. } => "install.task_error",
            Self::ConcurrencyError { .. } => "install.concurrency_error",
        };
        Some(code)
    }
}
