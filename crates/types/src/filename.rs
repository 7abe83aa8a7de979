//! Package file name parsing

use serde::{Deserialize, Serialize};
use sprig_errors::PackageError;
use std::fmt;

/// Artifact format, decided by the file name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    /// `.conda`: zip container holding zstd-compressed tarballs
    Conda,
    /// `.tar.bz2`: legacy bzip2 tarball
    TarBz2,
    /// `.whl`: Python wheel
    Wheel,
}

impl ArchiveKind {
    /// Detect the kind from a file name
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.ends_with(".conda") {
            Some(Self::Conda)
        } else if filename.ends_with(".tar.bz2") {
            Some(Self::TarBz2)
        } else if filename.ends_with(".whl") {
            Some(Self::Wheel)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Conda => ".conda",
            Self::TarBz2 => ".tar.bz2",
            Self::Wheel => ".whl",
        }
    }

    /// Whether the conda archive codec can unpack this kind
    #[must_use]
    pub const fn is_conda_package(self) -> bool {
        matches!(self, Self::Conda | Self::TarBz2)
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Name, version and build string parsed out of a package file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageFilename {
    pub name: String,
    pub version: String,
    pub build: String,
    pub kind: ArchiveKind,
}

impl PackageFilename {
    /// Parse `name-version-build.conda`, `name-version-build.tar.bz2` or a
    /// wheel name `name-version[-build]-python-abi-platform.whl`
    ///
    /// # Errors
    ///
    /// Returns `PackageError::InvalidFilename` if the suffix is unknown or a
    /// component is missing.
    pub fn parse(filename: &str) -> Result<Self, PackageError> {
        let invalid = || PackageError::InvalidFilename {
            name: filename.to_string(),
        };
        let kind = ArchiveKind::from_filename(filename).ok_or_else(invalid)?;
        let stem = &filename[..filename.len() - kind.extension().len()];

        if kind == ArchiveKind::Wheel {
            let parts: Vec<&str> = stem.split('-').collect();
            let (name, version, build) = match parts.as_slice() {
                [name, version, _, _, _] => (*name, *version, ""),
                [name, version, build, _, _, _] => (*name, *version, *build),
                _ => return Err(invalid()),
            };
            if name.is_empty() || version.is_empty() {
                return Err(invalid());
            }
            return Ok(Self {
                name: name.to_string(),
                version: version.to_string(),
                build: build.to_string(),
                kind,
            });
        }

        let mut parts = stem.rsplitn(3, '-');
        let build = parts.next().unwrap_or_default();
        let version = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        if name.is_empty() || version.is_empty() || build.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            build: build.to_string(),
            kind,
        })
    }
}

/// Platform directories a conda channel is laid out in
pub const KNOWN_SUBDIRS: &[&str] = &[
    "noarch",
    "linux-32",
    "linux-64",
    "linux-aarch64",
    "linux-armv6l",
    "linux-armv7l",
    "linux-ppc64",
    "linux-ppc64le",
    "linux-riscv64",
    "linux-s390x",
    "osx-64",
    "osx-arm64",
    "win-32",
    "win-64",
    "win-arm64",
    "emscripten-wasm32",
    "wasi-wasm32",
    "freebsd-64",
    "zos-z",
];

/// Whether `segment` names a channel platform directory
#[must_use]
pub fn is_known_subdir(segment: &str) -> bool {
    KNOWN_SUBDIRS.contains(&segment)
}

/// File name without its archive suffix; used as the cache directory name
#[must_use]
pub fn strip_archive_extension(filename: &str) -> &str {
    match ArchiveKind::from_filename(filename) {
        Some(kind) => &filename[..filename.len() - kind.extension().len()],
        None => filename,
    }
}
