#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Cache integrity monitor
//!
//! Older releases merged URL-derived metadata over package manifests and
//! persisted stub values. Records written that way are still on disk. This
//! crate recognizes them so that lookups treat them as cache misses and the
//! pipeline re-derives the record. Nothing here mutates or deletes a record.

mod corruption;
mod verdict;

pub use corruption::{corruption_signature, is_corrupted, CorruptionSignature};
pub use verdict::{inspect_record, RecordVerdict, VerificationStats};
