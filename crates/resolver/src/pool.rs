//! Solver-side package storage
//!
//! The solver treats packages as opaque attribute bags grouped into
//! repositories, plus one integer slot per item that it returns untouched.
//! [`SolverPool`] is that surface; [`MemoryPool`] is the in-process
//! implementation, which can be persisted between runs.

use serde::{Deserialize, Serialize};
use sprig_errors::{Error, StorageError};
use sprig_types::IndexJson;
use std::path::Path;

/// Repository that holds packages given explicitly by URL
pub const EXPLICIT_SPECS_REPO: &str = "__explicit_specs__";

/// Repository handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId(u32);

/// Package handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolvableId(u32);

impl SolvableId {
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Storage the external solver exposes for packages
pub trait SolverPool {
    /// Create a repository, or return the existing one with this name
    fn add_repo(&mut self, name: &str) -> RepoId;

    fn repo_name(&self, repo: RepoId) -> Option<&str>;

    /// Add a package; the solver keeps `attributes` verbatim
    fn add_solvable(&mut self, repo: RepoId, attributes: IndexJson) -> SolvableId;

    fn attributes(&self, id: SolvableId) -> Option<&IndexJson>;

    fn repo_of(&self, id: SolvableId) -> Option<RepoId>;

    /// Write the opaque per-item slot
    fn set_tag(&mut self, id: SolvableId, tag: u32);

    /// Read the opaque per-item slot; `None` if it was never written
    fn tag(&self, id: SolvableId) -> Option<u32>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Solvable {
    repo: RepoId,
    attributes: IndexJson,
    #[serde(default)]
    tag: Option<u32>,
}

/// In-memory pool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPool {
    repos: Vec<String>,
    solvables: Vec<Solvable>,
}

impl MemoryPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packages in the pool
    #[must_use]
    pub fn len(&self) -> usize {
        self.solvables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.solvables.is_empty()
    }

    /// All package handles in insertion order
    pub fn solvables(&self) -> impl Iterator<Item = SolvableId> + '_ {
        (0..self.solvables.len()).filter_map(|i| u32::try_from(i).ok().map(SolvableId))
    }

    /// First package with the given name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<SolvableId> {
        self.solvables().find(|id| {
            self.attributes(*id)
                .and_then(|attrs| attrs.name.as_deref())
                == Some(name)
        })
    }

    /// Write the pool to disk, replacing any previous file atomically
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem operation fails.
    pub async fn save(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &tmp))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StorageError::AtomicRenameFailed {
                message: format!("{} -> {}: {e}", tmp.display(), path.display()),
            })?;
        Ok(())
    }

    /// Read a pool written by [`MemoryPool::save`]
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, path))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::CorruptedData {
                message: format!("{}: {e}", path.display()),
            }
            .into()
        })
    }

    fn solvable(&self, id: SolvableId) -> Option<&Solvable> {
        self.solvables.get(id.0 as usize)
    }
}

impl SolverPool for MemoryPool {
    fn add_repo(&mut self, name: &str) -> RepoId {
        if let Some(index) = self.repos.iter().position(|repo| repo == name) {
            return RepoId(u32::try_from(index).unwrap_or(u32::MAX));
        }
        self.repos.push(name.to_string());
        RepoId(u32::try_from(self.repos.len() - 1).unwrap_or(u32::MAX))
    }

    fn repo_name(&self, repo: RepoId) -> Option<&str> {
        self.repos.get(repo.0 as usize).map(String::as_str)
    }

    fn add_solvable(&mut self, repo: RepoId, attributes: IndexJson) -> SolvableId {
        self.solvables.push(Solvable {
            repo,
            attributes,
            tag: None,
        });
        SolvableId(u32::try_from(self.solvables.len() - 1).unwrap_or(u32::MAX))
    }

    fn attributes(&self, id: SolvableId) -> Option<&IndexJson> {
        self.solvable(id).map(|s| &s.attributes)
    }

    fn repo_of(&self, id: SolvableId) -> Option<RepoId> {
        self.solvable(id).map(|s| s.repo)
    }

    fn set_tag(&mut self, id: SolvableId, tag: u32) {
        if let Some(solvable) = self.solvables.get_mut(id.0 as usize) {
            solvable.tag = Some(tag);
        }
    }

    fn tag(&self, id: SolvableId) -> Option<u32> {
        self.solvable(id).and_then(|s| s.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repos_are_deduplicated_by_name() {
        let mut pool = MemoryPool::new();
        let a = pool.add_repo("conda-forge/linux-64");
        let b = pool.add_repo(EXPLICIT_SPECS_REPO);
        assert_ne!(a, b);
        assert_eq!(pool.add_repo("conda-forge/linux-64"), a);
        assert_eq!(pool.repo_name(b), Some(EXPLICIT_SPECS_REPO));
    }

    #[test]
    fn tag_slot_starts_empty() {
        let mut pool = MemoryPool::new();
        let repo = pool.add_repo("r");
        let id = pool.add_solvable(repo, IndexJson::default());
        assert_eq!(pool.tag(id), None);
        pool.set_tag(id, 7);
        assert_eq!(pool.tag(id), Some(7));
        assert_eq!(pool.repo_of(id), Some(repo));
    }
}
