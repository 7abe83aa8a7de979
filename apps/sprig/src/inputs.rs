//! Turning command line inputs into package models

use sprig_errors::{Error, PackageError};
use sprig_repodata::{from_lockfile, from_url, LockfileFormat};
use sprig_resolver::{add_explicit_packages, add_package, from_solved, MemoryPool, SolverPool};
use sprig_types::{ArchiveKind, PackageInfo};
use tracing::debug;

/// Repository holding channel-authoritative lockfile entries in the pool
const LOCKFILE_REPO: &str = "lockfile";

/// Models for every input, in order
///
/// An input naming an existing file that is not a package archive is read as
/// a lockfile; anything else is a package URL or path.
pub async fn load_models(inputs: &[String]) -> Result<Vec<PackageInfo>, Error> {
    let mut models = Vec::new();
    for input in inputs {
        if is_lockfile(input).await {
            let content = tokio::fs::read_to_string(input)
                .await
                .map_err(|e| Error::io_with_path(&e, input))?;
            let format =
                LockfileFormat::detect(&content).ok_or_else(|| PackageError::InvalidLockfile {
                    message: format!("{input}: neither @EXPLICIT nor conda-lock"),
                })?;
            let parsed = from_lockfile(&content, &format)?;
            debug!(path = %input, count = parsed.len(), "read lockfile");
            models.extend(parsed);
        } else {
            models.push(from_url(input)?);
        }
    }
    Ok(models)
}

async fn is_lockfile(input: &str) -> bool {
    ArchiveKind::from_filename(input).is_none()
        && tokio::fs::metadata(input)
            .await
            .is_ok_and(|metadata| metadata.is_file())
}

/// Pass models through a solver pool and rebuild them from its output
///
/// URL-derived models enter as explicit single-package sources, the rest
/// through a lockfile repository. Every item is selected, in input order;
/// provenance comes back from the pool's attribute slot alone.
pub fn round_trip(models: &[PackageInfo]) -> Result<Vec<PackageInfo>, Error> {
    let mut pool = MemoryPool::new();

    let (indexed, explicit): (Vec<_>, Vec<_>) = models
        .iter()
        .enumerate()
        .partition(|(_, model)| model.provenance().is_some_and(|p| p.is_channel_authoritative()));

    let explicit_models: Vec<PackageInfo> =
        explicit.iter().map(|(_, model)| (*model).clone()).collect();
    let explicit_ids = add_explicit_packages(&mut pool, &explicit_models)?;

    let mut selected: Vec<_> = explicit
        .iter()
        .map(|(index, _)| *index)
        .zip(explicit_ids)
        .collect();

    let repo = pool.add_repo(LOCKFILE_REPO);
    for (index, model) in indexed {
        selected.push((index, add_package(&mut pool, repo, model)?));
    }
    selected.sort_by_key(|(index, _)| *index);

    selected
        .into_iter()
        .map(|(_, id)| from_solved(&pool, id))
        .collect()
}
