#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Fetch-extract pipeline for sprig
//!
//! For each package model this crate drives acquisition, extraction, the
//! manifest read, the merge and persistence of the canonical record, then
//! registers the cache entry. [`FetchExecutor`] runs one pipeline per package
//! behind a bounded worker pool and supports cooperative cancellation.

mod context;
mod executor;
mod guard;
mod pipeline;

pub use context::{FetchContext, PackageScope};
pub use executor::{FetchExecutor, FetchReport, PackageResult};
pub use guard::ExtractionGuard;
pub use pipeline::{PackageFetcher, PackageOutcome};

use sprig_config::Config;
use sprig_errors::Error;
use sprig_events::EventSender;
use sprig_net::Downloader;
use sprig_store::PackageCache;
use std::sync::Arc;

/// Build an executor wired to the cache and downloader described by `config`
///
/// Download progress goes to `events` when given.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub fn executor_from_config(
    config: &Config,
    events: Option<EventSender>,
) -> Result<FetchExecutor, Error> {
    let cache = Arc::new(PackageCache::new(config.pkgs_dir(), config.lock_timeout()));
    let mut downloader = Downloader::from_config(config)?;
    if let Some(tx) = events {
        downloader = downloader.with_events(tx);
    }
    let fetcher = Arc::new(PackageFetcher::new(cache, Arc::new(downloader)));
    Ok(FetchExecutor::new(fetcher, config.general.parallel_downloads))
}
