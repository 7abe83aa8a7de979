//! Storage and filesystem-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum StorageError {
    #[error("disk full: {path}")]
    DiskFull { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("corrupted data: {message}")]
    CorruptedData { message: String },

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("lock acquisition failed: {path}")]
    LockFailed { path: String },

    #[error("timed out after {seconds}s waiting for lock on {path}")]
    LockTimeout { path: String, seconds: u64 },

    #[error("extraction of {archive} failed: {message}")]
    ExtractionFailed { archive: String, message: String },

    #[error("atomic rename failed: {message}")]
    AtomicRenameFailed { message: String },

    #[error("cache entry not found: {key}")]
    EntryNotFound { key: String },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
        }
    }
}

impl StorageError {
    /// Convert an `io::Error` into a `StorageError` with an associated path
    #[must_use]
    pub fn from_io_with_path(err: &std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::NotFound => Self::PathNotFound {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists {
                path: path.display().to_string(),
            },
            _ => Self::IoError {
                message: format!("{}: {}", path.display(), err),
            },
        }
    }
}

impl UserFacingError for StorageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DiskFull { .. } => Some("Free up disk space in the package cache and retry."),
            Self::PermissionDenied { .. } => {
                Some("Adjust filesystem permissions on the package cache directory.")
            }
            Self::LockFailed { .. } | Self::LockTimeout { .. } => {
                Some("Wait for other sprig processes using the cache to finish, then retry.")
            }
            Self::ExtractionFailed { .. } => Some("Delete the cached archive and fetch it again."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockFailed { .. } | Self::LockTimeout { .. } | Self::IoError { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DiskFull { .. } => "storage.disk_full",
            Self::PermissionDenied { .. } => "storage.permission_denied",
            Self::PathNotFound { .. } => "storage.path_not_found",
            Self::AlreadyExists { .. } => "storage.already_exists",
            Self::IoError { .. } => "storage.io_error",
            Self::CorruptedData { .. } => "storage.corrupted_data",
            Self::InvalidPath { .. } => "storage.invalid_path",
            Self::LockFailed { .. } => "storage.lock_failed",
            Self::LockTimeout { .. } => "storage.lock_timeout",
            Self::ExtractionFailed { .. } => "storage.extraction_failed",
            Self::AtomicRenameFailed { .. } => "storage.atomic_rename_failed",
            Self::EntryNotFound { .. } => "storage.entry_not_found",
        };
        Some(code)
    }
}
