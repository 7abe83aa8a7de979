//! Moving package models into the solver and back out

use crate::pool::{RepoId, SolvableId, SolverPool, EXPLICIT_SPECS_REPO};
use crate::tag::{decode, encode, SolverTag};
use sprig_errors::{Error, IntegrityError};
use sprig_types::{PackageInfo, Provenance, SourceKind};
use tracing::debug;

const SOURCE_LABEL: &str = "solver";

/// Add a model to `repo`, storing its provenance in the item's tag slot
///
/// # Errors
///
/// Returns `IntegrityError::UnsetProvenance` if the model has none; such a
/// model must never enter the solver.
pub fn add_package<P: SolverPool + ?Sized>(
    pool: &mut P,
    repo: RepoId,
    model: &PackageInfo,
) -> Result<SolvableId, IntegrityError> {
    let provenance = model
        .provenance()
        .ok_or_else(|| IntegrityError::UnsetProvenance {
            package: model.identity(),
            source_kind: model.source().to_string(),
        })?;
    let id = pool.add_solvable(repo, model.to_document());
    let tag = encode(provenance);
    pool.set_tag(id, tag.raw());
    debug!(package = %model.identity(), %tag, "added package to solver pool");
    Ok(id)
}

/// Add URL-derived models to the explicit-specs repository
///
/// # Errors
///
/// Returns `IntegrityError::ProvenanceMismatch` if a model is
/// channel-authoritative, or the error from [`add_package`].
pub fn add_explicit_packages<P: SolverPool + ?Sized>(
    pool: &mut P,
    models: &[PackageInfo],
) -> Result<Vec<SolvableId>, IntegrityError> {
    let repo = pool.add_repo(EXPLICIT_SPECS_REPO);
    models
        .iter()
        .map(|model| {
            if model.provenance() == Some(Provenance::ChannelAuthoritative) {
                return Err(IntegrityError::ProvenanceMismatch {
                    package: model.identity(),
                    expected: "url-derived".to_string(),
                    found: Provenance::ChannelAuthoritative.to_string(),
                });
            }
            add_package(pool, repo, model)
        })
        .collect()
}

/// Whether a solved item came from a single-package explicit source. Answered
/// from the item's repository, independent of the solve graph.
pub fn is_explicit<P: SolverPool + ?Sized>(pool: &P, id: SolvableId) -> bool {
    pool.repo_of(id)
        .and_then(|repo| pool.repo_name(repo))
        .is_some_and(|name| name == EXPLICIT_SPECS_REPO)
}

/// Rebuild a model from a solved item, recovering its provenance.
///
/// # Errors
///
/// Returns an integrity error when the tag slot is empty or does not decode,
/// or when an explicit item decodes as channel-authoritative.
pub fn from_solved<P: SolverPool + ?Sized>(pool: &P, id: SolvableId) -> Result<PackageInfo, Error> {
    let attributes = pool
        .attributes(id)
        .ok_or_else(|| Error::internal(format!("solver returned unknown item {}", id.index())))?;
    let identity = format!(
        "{}-{}-{}",
        attributes.name.as_deref().unwrap_or_default(),
        attributes.version.as_deref().unwrap_or_default(),
        attributes.build.as_deref().unwrap_or_default()
    );

    let raw = pool.tag(id).ok_or_else(|| IntegrityError::UnsetProvenance {
        package: identity.clone(),
        source_kind: SOURCE_LABEL.to_string(),
    })?;
    let provenance = decode(SolverTag::from_raw(raw)).map_err(|e| IntegrityError::UnknownTag {
        package: identity.clone(),
        source_kind: SOURCE_LABEL.to_string(),
        tag: raw,
        reason: e.to_string(),
    })?;

    if is_explicit(pool, id) && provenance.is_channel_authoritative() {
        return Err(IntegrityError::ProvenanceMismatch {
            package: identity,
            expected: "url-derived".to_string(),
            found: provenance.to_string(),
        }
        .into());
    }

    let name = attributes.name.clone().unwrap_or_default();
    let mut model = PackageInfo::new(name, SourceKind::Solved, provenance);
    model.absorb(attributes.clone());
    Ok(model)
}
