#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for sprig
//!
//! This crate is the download layer of the fetch pipeline: it turns a
//! package URL into a [`SourceLocator`], resolves mirrors from
//! configuration, and writes artifact bytes to disk while measuring their
//! md5, sha256 and size. Retries live here and nowhere else.

mod client;
mod fetch;
mod locator;
mod retry;

pub use client::{NetClient, NetConfig};
pub use fetch::{Downloader, Fetcher};
pub use locator::{SourceLocator, Transport};

use sprig_errors::{Error, NetworkError};
use url::Url;

/// Parse and validate a URL
///
/// # Errors
///
/// Returns an error if the URL string is malformed or invalid according to RFC 3986.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://example.com").is_ok());
        assert!(parse_url("not a url").is_err());
    }
}
