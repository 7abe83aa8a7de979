//! HTTP client with connection pooling and retry logic

use crate::retry::backoff_delay;
use reqwest::{Client, Response};
use sprig_config::NetworkConfig;
use sprig_errors::{Error, NetworkError, UserFacingError};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // 5 minutes for large downloads
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
            user_agent: format!("sprig/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&NetworkConfig> for NetConfig {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            timeout: config.timeout(),
            retry_count: config.retries,
            retry_delay: config.retry_delay(),
            ..Self::default()
        }
    }
}

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| NetworkError::ConnectionRefused(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created with default settings.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(NetConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Send a single GET request; non-success statuses become `HttpError`
    ///
    /// # Errors
    ///
    /// Returns a `NetworkError` describing the transport failure or status.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status: status.as_u16(),
                message: status.to_string(),
            }
            .into());
        }
        Ok(response)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent
    ///
    /// `on_retry` is called with the upcoming attempt number, the delay and
    /// the error that triggered the retry.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error unchanged, or
    /// `NetworkError::RetriesExhausted` carrying the last failure.
    pub async fn with_retries<T, F, Fut, R>(
        &self,
        url: &str,
        mut operation: F,
        mut on_retry: R,
    ) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
        R: FnMut(u32, Duration, &Error),
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !should_retry(&err) => return Err(err),
                Err(err) if attempt >= self.config.retry_count => {
                    return Err(NetworkError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: attempt + 1,
                        message: err.to_string(),
                    }
                    .into());
                }
                Err(err) => {
                    attempt += 1;
                    let delay = backoff_delay(
                        self.config.retry_delay,
                        self.config.max_retry_delay,
                        attempt,
                    );
                    debug!(url, attempt, ?delay, error = %err, "retrying request");
                    on_retry(attempt, delay, &err);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Only transport-level failures are worth another attempt
fn should_retry(error: &Error) -> bool {
    match error {
        Error::Network(err) => err.is_retryable(),
        _ => false,
    }
}

fn map_reqwest_error(url: &str, error: &reqwest::Error) -> Error {
    if error.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
        .into()
    } else if error.is_connect() {
        NetworkError::ConnectionRefused(error.to_string()).into()
    } else if let Some(status) = error.status() {
        NetworkError::HttpError {
            status: status.as_u16(),
            message: error.to_string(),
        }
        .into()
    } else {
        NetworkError::DownloadFailed(error.to_string()).into()
    }
}

/// Map a body-stream failure while reading a response
pub(crate) fn stream_error(url: &str, message: &str) -> Error {
    NetworkError::DownloadFailed(format!("{url}: {message}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_client(retries: u32) -> NetClient {
        NetClient::new(NetConfig {
            retry_count: retries,
            retry_delay: Duration::ZERO,
            ..NetConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let client = fast_client(3);
        let calls = &AtomicU32::new(0);
        let mut retries = Vec::new();

        let value = client
            .with_retries(
                "https://example.com/a.conda",
                move || async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err::<i32, Error>(NetworkError::ConnectionRefused("reset".into()).into())
                    } else {
                        Ok(7)
                    }
                },
                |attempt, _, _| retries.push(attempt),
            )
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(retries, vec![1, 2]);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let client = fast_client(3);
        let calls = &AtomicU32::new(0);

        let err = client
            .with_retries(
                "https://example.com/a.conda",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), Error>(
                        NetworkError::HttpError {
                            status: 404,
                            message: "Not Found".into(),
                        }
                        .into(),
                    )
                },
                |_, _, _| {},
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err,
            Error::Network(NetworkError::HttpError { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn exhausted_budget_reports_attempts() {
        let client = fast_client(2);
        let err = client
            .with_retries(
                "https://example.com/a.conda",
                || async { Err::<(), Error>(NetworkError::DownloadFailed("eof".into()).into()) },
                |_, _, _| {},
            )
            .await
            .unwrap_err();

        match err {
            Error::Network(NetworkError::RetriesExhausted { attempts, .. }) => {
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
