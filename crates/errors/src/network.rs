//! Network-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("unsupported transport for {url}")]
    UnsupportedScheme { url: String },

    #[error("no mirror configured for {mirror}")]
    UnknownMirror { mirror: String },

    #[error("download of {url} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("network unavailable")]
    NetworkUnavailable,
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::RetriesExhausted { .. } => {
                Some("Check your connection or raise network.retries in the config.")
            }
            Self::UnknownMirror { .. } => Some("Add the mirror under [mirrors] in the config."),
            Self::NetworkUnavailable => Some("Connect to a network and retry."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::DownloadFailed(_)
            | Self::ConnectionRefused(_)
            | Self::NetworkUnavailable => true,
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Timeout { .. } => "network.timeout",
            Self::DownloadFailed(_) => "network.download_failed",
            Self::ConnectionRefused(_) => "network.connection_refused",
            Self::InvalidUrl(_) => "network.invalid_url",
            Self::HttpError { .. } => "network.http_error",
            Self::UnsupportedScheme { .. } => "network.unsupported_scheme",
            Self::UnknownMirror { .. } => "network.unknown_mirror",
            Self::RetriesExhausted { .. } => "network.retries_exhausted",
            Self::NetworkUnavailable => "network.unavailable",
        };
        Some(code)
    }
}
