#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package metadata construction and merging for sprig
//!
//! Every way a package model comes into existence lives here, and each one
//! assigns provenance: URLs ([`from_url`]), channel index entries
//! ([`from_channel_index`]), lockfiles ([`from_lockfile`]) and cached records
//! ([`from_cache_record`]). Solved items are handled by `sprig-resolver`.
//! [`merge`] turns a model and the artifact's manifest into the canonical
//! record.

mod cache;
mod channel;
mod checksum_fragment;
mod lockfile;
mod manifest;
mod merge;
mod url;

pub use cache::from_cache_record;
pub use channel::{from_channel_index, ChannelRepodata, RepodataInfo};
pub use lockfile::{from_lockfile, LockfileFormat, EXPLICIT_MARKER};
pub use manifest::{read_index_json, ManifestRead};
pub use merge::merge;
pub use url::from_url;
