//! RAII guard for partially extracted package directories

use std::path::{Path, PathBuf};
use tracing::warn;

/// Removes an extraction directory on drop unless the pipeline finished
///
/// Covers failure, panic and cancellation: a later run never sees a
/// half-extracted tree as a complete entry.
#[derive(Debug)]
pub struct ExtractionGuard {
    dir: Option<PathBuf>,
}

impl ExtractionGuard {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Keep the directory; called once its record is persisted
    pub fn disarm(mut self) -> Option<PathBuf> {
        self.dir.take()
    }
}

impl Drop for ExtractionGuard {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        // Synchronous: a spawned task may never run if the runtime is shutting down
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => warn!(dir = %dir.display(), "removed partial extraction"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to remove partial extraction");
            }
        }
    }
}
