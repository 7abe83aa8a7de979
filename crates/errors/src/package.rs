//! Package-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PackageError {
    #[error("not a package file name: {name}")]
    InvalidFilename { name: String },

    #[error("unsupported package kind: {name}")]
    UnsupportedKind { name: String },

    #[error("invalid channel index entry: {message}")]
    InvalidIndexEntry { message: String },

    #[error("invalid lockfile: {message}")]
    InvalidLockfile { message: String },

    #[error("invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("invalid repodata record: {message}")]
    InvalidRecord { message: String },

    #[error("invalid package format: {message}")]
    InvalidFormat { message: String },
}

impl UserFacingError for PackageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidFilename { .. } | Self::UnsupportedKind { .. } => {
                Some("Package URLs must end in .conda, .tar.bz2 or .whl.")
            }
            Self::InvalidLockfile { .. } => {
                Some("Regenerate the lockfile or check that it is an @EXPLICIT or conda-lock file.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidFilename { .. } => "package.invalid_filename",
            Self::UnsupportedKind { .. } => "package.unsupported_kind",
            Self::InvalidIndexEntry { .. } => "package.invalid_index_entry",
            Self::InvalidLockfile { .. } => "package.invalid_lockfile",
            Self::InvalidManifest { .. } => "package.invalid_manifest",
            Self::InvalidRecord { .. } => "package.invalid_record",
            Self::InvalidFormat { .. } => "package.invalid_format",
        };
        Some(code)
    }
}
