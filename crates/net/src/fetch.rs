//! Artifact acquisition: the `Fetcher` seam and its default implementation

use crate::client::{stream_error, NetClient, NetConfig};
use crate::locator::{SourceLocator, Transport};
use futures::TryStreamExt;
use sprig_config::Config;
use sprig_errors::{Error, NetworkError};
use sprig_events::{AcquisitionEvent, AppEvent, EventEmitter, EventSender, FailureContext};
use sprig_hash::ArtifactDigest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

/// Download layer used by the fetch pipeline
///
/// Implementations own their retry policy. On success `destination` holds
/// the complete artifact and the returned digest describes those bytes.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        locator: &SourceLocator,
        destination: &Path,
    ) -> Result<ArtifactDigest, Error>;
}

/// Fetches over HTTP(S), from `file://` URLs and through configured mirrors
#[derive(Clone)]
pub struct Downloader {
    client: NetClient,
    mirrors: BTreeMap<String, Vec<String>>,
    tx: Option<EventSender>,
}

impl Downloader {
    #[must_use]
    pub fn new(client: NetClient, mirrors: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            client,
            mirrors,
            tx: None,
        }
    }

    /// Build a downloader from the network and mirror sections of `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let client = NetClient::new(NetConfig::from(&config.network))?;
        Ok(Self::new(client, config.mirrors.clone()))
    }

    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Candidate URLs for a locator, in the order they are tried
    fn candidates(&self, locator: &SourceLocator) -> Result<Vec<String>, Error> {
        match locator.transport {
            Transport::Channel | Transport::File => Ok(vec![locator.path.clone()]),
            Transport::Mirror => {
                let bases = self
                    .mirrors
                    .get(&locator.mirror)
                    .filter(|bases| !bases.is_empty())
                    .ok_or_else(|| NetworkError::UnknownMirror {
                        mirror: locator.mirror.clone(),
                    })?;
                Ok(bases
                    .iter()
                    .map(|base| format!("{}/{}", base.trim_end_matches('/'), locator.path))
                    .collect())
            }
        }
    }

    async fn fetch_http(&self, url: &str, partial: &Path) -> Result<ArtifactDigest, Error> {
        let package = url.rsplit('/').next().unwrap_or(url).to_string();
        self.client
            .with_retries(
                url,
                || self.fetch_http_once(url, partial),
                |attempt, delay, err| {
                    self.emit(AppEvent::Acquisition(AcquisitionEvent::Retrying {
                        url: url.to_string(),
                        attempt,
                        delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        reason: err.to_string(),
                    }));
                },
            )
            .await
            .inspect_err(|err| debug!(%package, error = %err, "http fetch gave up"))
    }

    async fn fetch_http_once(&self, url: &str, partial: &Path) -> Result<ArtifactDigest, Error> {
        let response = self.client.get(url).await?;
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = StreamReader::new(stream);

        let file = File::create(partial)
            .await
            .map_err(|e| Error::io_with_path(&e, partial))?;

        ArtifactDigest::hash_and_copy(reader, file)
            .await
            .map_err(|err| match err {
                // Body stream failures surface as `Other`; disk failures keep their kind.
                Error::Io {
                    kind: std::io::ErrorKind::Other,
                    path: None,
                    ref message,
                } => stream_error(url, message),
                other => other,
            })
    }

    async fn fetch_file(
        &self,
        locator: &SourceLocator,
        partial: &Path,
    ) -> Result<ArtifactDigest, Error> {
        let source = locator
            .url()
            .to_file_path()
            .map_err(|()| NetworkError::InvalidUrl(locator.path.clone()))?;
        let reader = File::open(&source)
            .await
            .map_err(|e| Error::io_with_path(&e, &source))?;
        let writer = File::create(partial)
            .await
            .map_err(|e| Error::io_with_path(&e, partial))?;
        ArtifactDigest::hash_and_copy(reader, writer).await
    }

    async fn fetch_to(
        &self,
        locator: &SourceLocator,
        partial: &Path,
    ) -> Result<ArtifactDigest, Error> {
        if locator.transport == Transport::File {
            return self.fetch_file(locator, partial).await;
        }

        let mut last_error = None;
        for url in self.candidates(locator)? {
            match self.fetch_http(&url, partial).await {
                Ok(digest) => return Ok(digest),
                Err(err) => {
                    if locator.transport == Transport::Mirror {
                        warn!(%url, error = %err, "mirror failed, trying next");
                    }
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            NetworkError::UnknownMirror {
                mirror: locator.mirror.clone(),
            }
            .into()
        }))
    }
}

impl EventEmitter for Downloader {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

#[async_trait::async_trait]
impl Fetcher for Downloader {
    async fn fetch(
        &self,
        locator: &SourceLocator,
        destination: &Path,
    ) -> Result<ArtifactDigest, Error> {
        let package = locator.filename().to_string();
        let url = locator.url().to_string();
        self.emit(AppEvent::Acquisition(AcquisitionEvent::Started {
            package: package.clone(),
            url: url.clone(),
            mirror: (!locator.mirror.is_empty()).then(|| locator.mirror.clone()),
        }));

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        // Dropping this future mid-download must not leave the file behind
        let partial = PartialFile::new(partial_path(destination));
        let result = match self.fetch_to(locator, partial.path()).await {
            Ok(digest) => fs::rename(partial.path(), destination)
                .await
                .map(|()| digest)
                .map_err(|e| Error::io_with_path(&e, destination)),
            Err(err) => Err(err),
        };

        match result {
            Ok(digest) => {
                partial.keep();
                self.emit(AppEvent::Acquisition(AcquisitionEvent::Completed {
                    package,
                    url,
                    size: digest.size,
                    sha256: digest.sha256.clone(),
                }));
                Ok(digest)
            }
            Err(err) => {
                drop(partial);
                self.emit(AppEvent::Acquisition(AcquisitionEvent::Failed {
                    package,
                    url,
                    failure: FailureContext::from_error(&err),
                }));
                Err(err)
            }
        }
    }
}

/// In-progress download, removed on drop unless kept
struct PartialFile {
    path: PathBuf,
    remove: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, remove: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The file was renamed into place; nothing to clean up
    fn keep(mut self) {
        self.remove = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.remove {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "could not remove partial download"
            ),
        }
    }
}

/// Bytes are written next to the destination and renamed into place
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
