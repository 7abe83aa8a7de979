#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Solver round-trip adapter for sprig
//!
//! The constraint solver stores packages as attribute bags and knows nothing
//! about provenance. This crate packs provenance into the fixed-width slot
//! the solver keeps per item and unpacks it again from solved output, so a
//! model that went through a solve comes back with the stub set it went in
//! with.

mod adapter;
mod pool;
mod tag;

pub use adapter::{add_explicit_packages, add_package, from_solved, is_explicit};
pub use pool::{MemoryPool, RepoId, SolvableId, SolverPool, EXPLICIT_SPECS_REPO};
pub use tag::{decode, encode, SolverTag, TagDecodeError};
