#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package cache storage for sprig
//!
//! This crate manages the package cache directory: one extracted directory
//! per package basename, each holding the canonical record at
//! `info/repodata_record.json`. It also owns the archive codec used to
//! unpack `.conda` and `.tar.bz2` artifacts and the per-entry file lock.

mod archive;
mod cache;
mod lock;

pub use archive::{create_conda, create_tar_bz2, extract_package};
pub use cache::{CacheEntry, CacheLookup, CacheReport, PackageCache};
pub use lock::CacheLock;
