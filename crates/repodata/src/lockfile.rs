//! Models built from lockfiles

use crate::url::from_url;
use serde::Deserialize;
use sprig_errors::{Error, PackageError};
use serde_yml::{Mapping, Value};
use sprig_types::{FieldSet, PackageInfo, Provenance, SourceKind};

/// Marker line that opens an explicit spec file
pub const EXPLICIT_MARKER: &str = "@EXPLICIT";

/// Lockfile formats understood by [`from_lockfile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockfileFormat {
    /// `conda list --explicit` output: one package URL per line
    Explicit,
    /// conda-lock YAML; `platform` keeps only the entries for that subdir
    CondaLock { platform: Option<String> },
}

impl LockfileFormat {
    /// Guess the format from file contents
    #[must_use]
    pub fn detect(content: &str) -> Option<Self> {
        let explicit = content
            .lines()
            .map(str::trim)
            .any(|line| line == EXPLICIT_MARKER);
        if explicit {
            return Some(Self::Explicit);
        }
        let yaml_lock = content
            .lines()
            .any(|line| line.trim_end() == "package:" || line.starts_with("package:"));
        yaml_lock.then_some(Self::CondaLock { platform: None })
    }
}

/// Build models for every package a lockfile pins
///
/// # Errors
///
/// Returns `PackageError::InvalidLockfile` if the document does not match the
/// format, or the error of the first entry that cannot be converted.
pub fn from_lockfile(content: &str, format: &LockfileFormat) -> Result<Vec<PackageInfo>, Error> {
    match format {
        LockfileFormat::Explicit => parse_explicit(content),
        LockfileFormat::CondaLock { platform } => parse_conda_lock(content, platform.as_deref()),
    }
}

fn parse_explicit(content: &str) -> Result<Vec<PackageInfo>, Error> {
    let mut seen_marker = false;
    let mut models = Vec::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == EXPLICIT_MARKER {
            seen_marker = true;
            continue;
        }
        if !seen_marker {
            return Err(PackageError::InvalidLockfile {
                message: format!("entry before {EXPLICIT_MARKER}: {line}"),
            }
            .into());
        }
        models.push(from_url(line)?);
    }

    if !seen_marker {
        return Err(PackageError::InvalidLockfile {
            message: format!("missing {EXPLICIT_MARKER} marker"),
        }
        .into());
    }
    Ok(models)
}

#[derive(Debug, Deserialize)]
struct CondaLock {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
    #[serde(default = "default_manager")]
    manager: String,
    #[serde(default)]
    platform: Option<String>,
    /// Kept in file order
    #[serde(default)]
    dependencies: Mapping,
    url: String,
    #[serde(default)]
    hash: LockedHash,
}

#[derive(Debug, Default, Deserialize)]
struct LockedHash {
    md5: Option<String>,
    sha256: Option<String>,
}

fn default_manager() -> String {
    "conda".to_string()
}

fn parse_conda_lock(content: &str, platform: Option<&str>) -> Result<Vec<PackageInfo>, Error> {
    let lock: CondaLock =
        serde_yml::from_str(content).map_err(|e| PackageError::InvalidLockfile {
            message: e.to_string(),
        })?;

    lock.package
        .into_iter()
        .filter(|pkg| match (platform, pkg.platform.as_deref()) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        })
        .map(locked_to_model)
        .collect()
}

fn locked_to_model(pkg: LockedPackage) -> Result<PackageInfo, Error> {
    // The URL supplies channel, subdir, filename and build
    let located = from_url(&pkg.url)?;
    let source = if pkg.manager == "pip" {
        SourceKind::Wheel
    } else {
        SourceKind::CondaLock
    };

    let subdir = pkg.platform.unwrap_or(located.subdir);
    let mut stub_fields = source.stub_fields();
    if subdir.is_empty() {
        stub_fields |= FieldSet::SUBDIR;
    }

    let mut info = PackageInfo::new(pkg.name, source, Provenance::UrlDerived { stub_fields });
    info.version = pkg.version;
    info.build = located.build;
    info.channel = located.channel;
    info.subdir = subdir;
    info.filename = located.filename;
    info.url = located.url;
    info.md5 = pkg.hash.md5.or(located.md5);
    info.sha256 = pkg.hash.sha256.or(located.sha256);
    if source == SourceKind::CondaLock {
        let depends = pkg
            .dependencies
            .iter()
            .map(|(name, spec)| dependency_spec(name, spec))
            .collect::<Result<Vec<_>, Error>>()?;
        info.depends = Some(depends);
    }

    Ok(info)
}

/// `name: spec` as a match spec; `*` and empty specs match any version
fn dependency_spec(name: &Value, spec: &Value) -> Result<String, Error> {
    let invalid = |what: &str| PackageError::InvalidLockfile {
        message: format!("invalid dependency {what}: {name:?}: {spec:?}"),
    };
    let name = name.as_str().ok_or_else(|| invalid("name"))?;
    let spec = match spec {
        Value::Null => String::new(),
        Value::String(spec) => spec.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return Err(invalid("spec").into()),
    };
    Ok(match spec.as_str() {
        "" | "*" => name.to_string(),
        spec => format!("{name} {spec}"),
    })
}
