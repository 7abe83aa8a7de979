//! Advisory lock guarding one cache entry across processes

use fs2::FileExt;
use sprig_errors::{Error, StorageError};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive `flock` held for extract, merge and persist of one package
///
/// Released when dropped, on every exit path.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the lock at `path`, polling until `timeout` elapses
    ///
    /// # Errors
    ///
    /// Returns `StorageError::LockTimeout` if another holder keeps the lock
    /// past `timeout`, or `StorageError::LockFailed` on I/O errors.
    pub async fn acquire(path: &Path, timeout: Duration) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?
            .into_std()
            .await;

        let contended = fs2::lock_contended_error().kind();
        let deadline = Instant::now() + timeout;
        let mut waiting = false;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "acquired cache lock");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == contended => {
                    if Instant::now() >= deadline {
                        return Err(StorageError::LockTimeout {
                            path: path.display().to_string(),
                            seconds: timeout.as_secs(),
                        }
                        .into());
                    }
                    if !waiting {
                        debug!(path = %path.display(), "cache lock held elsewhere, waiting");
                        waiting = true;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => {
                    return Err(StorageError::LockFailed {
                        path: format!("{}: {e}", path.display()),
                    }
                    .into());
                }
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
