//! Decomposition of a package URL into what the download layer needs

use sprig_errors::{Error, NetworkError};
use std::fmt;
use url::Url;

/// How the bytes of an artifact are reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Plain `http(s)` channel URL
    Channel,
    /// `file://` URL on the local filesystem
    File,
    /// Reference into a named mirror (`oci://...`)
    Mirror,
}

/// Where to fetch one artifact from
///
/// Channel and file URLs carry an empty mirror identity and the full URL as
/// path. Mirror references are split into the mirror identity (the channel
/// part) and the mirror-relative `<subdir>/<filename>` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    pub transport: Transport,
    pub mirror: String,
    pub path: String,
    url: Url,
}

impl SourceLocator {
    /// Build a locator from a package URL. A `#fragment` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::InvalidUrl` when the URL does not parse or a
    /// mirror reference lacks a channel, subdir or filename, and
    /// `NetworkError::UnsupportedScheme` for any other scheme.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let mut url =
            Url::parse(raw).map_err(|e| NetworkError::InvalidUrl(format!("{raw}: {e}")))?;
        url.set_fragment(None);

        match url.scheme() {
            "http" | "https" => Ok(Self {
                transport: Transport::Channel,
                mirror: String::new(),
                path: url.to_string(),
                url,
            }),
            "file" => Ok(Self {
                transport: Transport::File,
                mirror: String::new(),
                path: url.to_string(),
                url,
            }),
            "oci" => {
                let full = url.to_string();
                let mut parts = full.rsplitn(3, '/');
                let (Some(filename), Some(subdir), Some(channel)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(NetworkError::InvalidUrl(raw.to_string()).into());
                };
                if filename.is_empty() || subdir.is_empty() || channel.ends_with(['/', ':']) {
                    return Err(NetworkError::InvalidUrl(raw.to_string()).into());
                }
                Ok(Self {
                    transport: Transport::Mirror,
                    mirror: channel.to_string(),
                    path: format!("{subdir}/{filename}"),
                    url,
                })
            }
            _ => Err(NetworkError::UnsupportedScheme {
                url: raw.to_string(),
            }
            .into()),
        }
    }

    /// The full URL without fragment
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Last path segment of the URL
    #[must_use]
    pub fn filename(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mirror.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{} ({})", self.path, self.mirror)
        }
    }
}
