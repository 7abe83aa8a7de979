//! Metadata integrity error types
//!
//! These errors mean a package's provenance could not be trusted. They are
//! always fatal for the package they describe and are never folded into
//! network or storage failures.

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum IntegrityError {
    #[error("package {package} reached the merge without provenance (source: {source_kind})")]
    UnsetProvenance {
        package: String,
        source_kind: String,
    },

    #[error("unrecognized provenance tag {tag:#010x} on {package} (source: {source_kind}): {reason}")]
    UnknownTag {
        package: String,
        source_kind: String,
        tag: u32,
        reason: String,
    },

    #[error("provenance mismatch for {package}: expected {expected}, found {found}")]
    ProvenanceMismatch {
        package: String,
        expected: String,
        found: String,
    },
}

impl IntegrityError {
    /// Identity of the package the error is about
    #[must_use]
    pub fn package(&self) -> &str {
        match self {
            Self::UnsetProvenance { package, .. }
            | Self::UnknownTag { package, .. }
            | Self::ProvenanceMismatch { package, .. } => package,
        }
    }
}

impl UserFacingError for IntegrityError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownTag { .. } => {
                Some("The solver pool was written by an incompatible version; rebuild it.")
            }
            Self::UnsetProvenance { .. } | Self::ProvenanceMismatch { .. } => {
                Some("Report this as a bug together with the package source that produced it.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnsetProvenance { .. } => "integrity.unset_provenance",
            Self::UnknownTag { .. } => "integrity.unknown_tag",
            Self::ProvenanceMismatch { .. } => "integrity.provenance_mismatch",
        };
        Some(code)
    }
}
