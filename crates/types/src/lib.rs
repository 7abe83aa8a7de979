#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for sprig
//!
//! This crate holds the package metadata model, its provenance, the documents
//! it is built from and the canonical record it is merged into.

mod features;
pub mod filename;
pub mod package;
pub mod provenance;
pub mod record;

pub use filename::{
    is_known_subdir, strip_archive_extension, ArchiveKind, PackageFilename, KNOWN_SUBDIRS,
};
pub use package::{IndexJson, PackageInfo, PackageKey};
pub use provenance::{FieldId, FieldSet, Provenance, SourceKind, FIELD_TABLE_VERSION};
pub use record::{RepodataRecord, INDEX_JSON_PATH, REPODATA_RECORD_PATH};
