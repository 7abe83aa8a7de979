#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for sprig
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/sprig/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

use serde::{Deserialize, Serialize};
use sprig_errors::{ConfigError, Error};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    /// Mirror identity (e.g. `oci://ghcr.io/channel-mirrors/conda-forge`)
    /// mapped to the base URLs that serve it, tried in order
    #[serde(default)]
    pub mirrors: BTreeMap<String, Vec<String>>,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_parallel_downloads")]
    pub parallel_downloads: usize,
}

/// Package cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub pkgs_dir: Option<PathBuf>,
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: u64, // seconds
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64, // seconds
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            parallel_downloads: default_parallel_downloads(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pkgs_dir: None,
            lock_timeout: default_lock_timeout(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

// Default value functions for serde
fn default_parallel_downloads() -> usize {
    4
}

fn default_lock_timeout() -> u64 {
    60
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1 // 1 second
}

impl NetworkConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("sprig").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if fs::try_exists(&config_path).await.unwrap_or(false) {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Write configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<(), Error> {
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            error: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }
        fs::write(path, contents)
            .await
            .map_err(|e| ConfigError::WriteError {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
        Ok(())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // SPRIG_PKGS_DIR
        if let Ok(dir) = std::env::var("SPRIG_PKGS_DIR") {
            if dir.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "SPRIG_PKGS_DIR".to_string(),
                    value: dir,
                }
                .into());
            }
            self.cache.pkgs_dir = Some(PathBuf::from(dir));
        }

        if let Some(downloads) = parse_env("SPRIG_PARALLEL_DOWNLOADS")? {
            self.general.parallel_downloads = downloads;
        }
        if let Some(timeout) = parse_env("SPRIG_LOCK_TIMEOUT")? {
            self.cache.lock_timeout = timeout;
        }
        if let Some(timeout) = parse_env("SPRIG_TIMEOUT")? {
            self.network.timeout = timeout;
        }
        if let Some(retries) = parse_env("SPRIG_RETRIES")? {
            self.network.retries = retries;
        }

        self.validate()
    }

    /// Reject values no component can work with
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.general.parallel_downloads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "general.parallel_downloads".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        for (mirror, urls) in &self.mirrors {
            if urls.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("mirrors.\"{mirror}\""),
                    value: "[]".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Get the package cache directory (with default)
    #[must_use]
    pub fn pkgs_dir(&self) -> PathBuf {
        self.cache.pkgs_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("sprig")
                .join("pkgs")
        })
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.cache.lock_timeout)
    }
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Result<Option<T>, Error> {
    match std::env::var(var) {
        Ok(value) => value.parse().map(Some).map_err(|_| {
            ConfigError::InvalidValue {
                field: var.to_string(),
                value,
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}
