//! Provenance of package metadata
//!
//! Every package model carries exactly one [`Provenance`]. Channel index
//! entries are authoritative for every field they carry. Everything else is
//! URL-derived and records which fields hold type defaults because the source
//! could not supply them. Which fields those are is decided by one table,
//! [`SourceKind::stub_fields`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the field-id table below. Bump it whenever a bit changes
/// meaning; solver tags written with another version are rejected.
pub const FIELD_TABLE_VERSION: u8 = 1;

bitflags! {
    /// Set of metadata fields, one bit per [`FieldId`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct FieldSet: u32 {
        const BUILD_NUMBER = 1 << 0;
        const LICENSE = 1 << 1;
        const LICENSE_FAMILY = 1 << 2;
        const TIMESTAMP = 1 << 3;
        const DEPENDS = 1 << 4;
        const CONSTRAINS = 1 << 5;
        const TRACK_FEATURES = 1 << 6;
        const SIZE = 1 << 7;
        const NOARCH = 1 << 8;
        const PYTHON_SITE_PACKAGES_PATH = 1 << 9;
        const VERSION = 1 << 10;
        const BUILD = 1 << 11;
        const SUBDIR = 1 << 12;
        const MD5 = 1 << 13;
        const SHA256 = 1 << 14;
    }
}

/// Closed table of fields that can be marked as stubs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    BuildNumber,
    License,
    LicenseFamily,
    Timestamp,
    Depends,
    Constrains,
    TrackFeatures,
    Size,
    Noarch,
    PythonSitePackagesPath,
    Version,
    Build,
    Subdir,
    Md5,
    Sha256,
}

impl FieldId {
    pub const ALL: [FieldId; 15] = [
        Self::BuildNumber,
        Self::License,
        Self::LicenseFamily,
        Self::Timestamp,
        Self::Depends,
        Self::Constrains,
        Self::TrackFeatures,
        Self::Size,
        Self::Noarch,
        Self::PythonSitePackagesPath,
        Self::Version,
        Self::Build,
        Self::Subdir,
        Self::Md5,
        Self::Sha256,
    ];

    /// Record key of this field
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::BuildNumber => "build_number",
            Self::License => "license",
            Self::LicenseFamily => "license_family",
            Self::Timestamp => "timestamp",
            Self::Depends => "depends",
            Self::Constrains => "constrains",
            Self::TrackFeatures => "track_features",
            Self::Size => "size",
            Self::Noarch => "noarch",
            Self::PythonSitePackagesPath => "python_site_packages_path",
            Self::Version => "version",
            Self::Build => "build",
            Self::Subdir => "subdir",
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    #[must_use]
    pub const fn flag(self) -> FieldSet {
        match self {
            Self::BuildNumber => FieldSet::BUILD_NUMBER,
            Self::License => FieldSet::LICENSE,
            Self::LicenseFamily => FieldSet::LICENSE_FAMILY,
            Self::Timestamp => FieldSet::TIMESTAMP,
            Self::Depends => FieldSet::DEPENDS,
            Self::Constrains => FieldSet::CONSTRAINS,
            Self::TrackFeatures => FieldSet::TRACK_FEATURES,
            Self::Size => FieldSet::SIZE,
            Self::Noarch => FieldSet::NOARCH,
            Self::PythonSitePackagesPath => FieldSet::PYTHON_SITE_PACKAGES_PATH,
            Self::Version => FieldSet::VERSION,
            Self::Build => FieldSet::BUILD,
            Self::Subdir => FieldSet::SUBDIR,
            Self::Md5 => FieldSet::MD5,
            Self::Sha256 => FieldSet::SHA256,
        }
    }

    /// Look a field up by its record key
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FieldSet {
    /// Whether `field` is a member of this set
    #[must_use]
    pub fn has(self, field: FieldId) -> bool {
        self.contains(field.flag())
    }

    /// Member fields in table order
    pub fn fields(self) -> impl Iterator<Item = FieldId> {
        FieldId::ALL.into_iter().filter(move |field| self.has(*field))
    }

    /// Record keys of the member fields
    #[must_use]
    pub fn keys(self) -> Vec<&'static str> {
        self.fields().map(FieldId::key).collect()
    }
}

impl FromIterator<FieldId> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        iter.into_iter()
            .fold(FieldSet::empty(), |set, field| set | field.flag())
    }
}

/// Where a package model's metadata came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// `.conda` or `.tar.bz2` archive URL, including `@EXPLICIT` lockfile lines
    CondaArchive,
    /// Python wheel URL
    Wheel,
    /// `git+...` source checkout
    SourceControl,
    /// conda-lock YAML entry
    CondaLock,
    /// Channel repository index entry
    ChannelIndex,
    /// Previously persisted, healthy record
    CachedRecord,
    /// Previously persisted record that carried the corruption signature
    HealedCacheRecord,
    /// Recovered from the solver's attribute slot
    Solved,
}

impl SourceKind {
    /// Fields whose values this source cannot supply.
    ///
    /// Channel index entries, healthy cached records and solved items have
    /// no row: the first two are authoritative and solved items recover their
    /// set from the solver tag.
    #[must_use]
    pub const fn stub_fields(self) -> FieldSet {
        const ARCHIVE: FieldSet = FieldSet::BUILD_NUMBER
            .union(FieldSet::LICENSE)
            .union(FieldSet::LICENSE_FAMILY)
            .union(FieldSet::TIMESTAMP)
            .union(FieldSet::DEPENDS)
            .union(FieldSet::CONSTRAINS)
            .union(FieldSet::TRACK_FEATURES)
            .union(FieldSet::SIZE)
            .union(FieldSet::NOARCH)
            .union(FieldSet::PYTHON_SITE_PACKAGES_PATH);

        match self {
            Self::CondaArchive | Self::Wheel => ARCHIVE,
            Self::SourceControl => ARCHIVE
                .union(FieldSet::VERSION)
                .union(FieldSet::BUILD)
                .union(FieldSet::SUBDIR),
            Self::CondaLock => FieldSet::BUILD_NUMBER
                .union(FieldSet::LICENSE)
                .union(FieldSet::LICENSE_FAMILY)
                .union(FieldSet::TIMESTAMP)
                .union(FieldSet::CONSTRAINS)
                .union(FieldSet::TRACK_FEATURES)
                .union(FieldSet::SIZE)
                .union(FieldSet::NOARCH)
                .union(FieldSet::PYTHON_SITE_PACKAGES_PATH),
            Self::HealedCacheRecord => FieldSet::BUILD_NUMBER
                .union(FieldSet::LICENSE)
                .union(FieldSet::LICENSE_FAMILY)
                .union(FieldSet::TIMESTAMP)
                .union(FieldSet::DEPENDS)
                .union(FieldSet::CONSTRAINS)
                .union(FieldSet::TRACK_FEATURES)
                .union(FieldSet::SIZE),
            Self::ChannelIndex | Self::CachedRecord | Self::Solved => FieldSet::empty(),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CondaArchive => "conda_archive",
            Self::Wheel => "wheel",
            Self::SourceControl => "source_control",
            Self::CondaLock => "conda_lock",
            Self::ChannelIndex => "channel_index",
            Self::CachedRecord => "cached_record",
            Self::HealedCacheRecord => "healed_cache_record",
            Self::Solved => "solved",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust classification of a package model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Every field present on the model is authoritative
    ChannelAuthoritative,
    /// Fields in `stub_fields` hold defaults and must yield to the manifest
    UrlDerived { stub_fields: FieldSet },
}

impl Provenance {
    /// URL-derived provenance with the table row for `source`
    #[must_use]
    pub const fn url_derived(source: SourceKind) -> Self {
        Self::UrlDerived {
            stub_fields: source.stub_fields(),
        }
    }

    /// Stub fields, empty for channel-authoritative models
    #[must_use]
    pub const fn stub_fields(&self) -> FieldSet {
        match self {
            Self::ChannelAuthoritative => FieldSet::empty(),
            Self::UrlDerived { stub_fields } => *stub_fields,
        }
    }

    #[must_use]
    pub const fn is_channel_authoritative(&self) -> bool {
        matches!(self, Self::ChannelAuthoritative)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelAuthoritative => write!(f, "channel-authoritative"),
            Self::UrlDerived { stub_fields } => {
                write!(f, "url-derived [{}]", stub_fields.keys().join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_has_a_distinct_bit() {
        let all: FieldSet = FieldId::ALL.into_iter().collect();
        assert_eq!(all, FieldSet::all());
        assert_eq!(all.bits().count_ones() as usize, FieldId::ALL.len());
        for field in FieldId::ALL {
            assert_eq!(FieldId::from_key(field.key()), Some(field));
        }
    }

    #[test]
    fn archive_row_never_stubs_checksums_or_identity() {
        let row = SourceKind::CondaArchive.stub_fields();
        assert!(row.has(FieldId::License));
        assert!(row.has(FieldId::Depends));
        assert!(!row.has(FieldId::Md5));
        assert!(!row.has(FieldId::Sha256));
        assert!(!row.has(FieldId::Version));
        assert_eq!(SourceKind::Wheel.stub_fields(), row);
    }

    #[test]
    fn conda_lock_trusts_its_dependency_list() {
        let row = SourceKind::CondaLock.stub_fields();
        assert!(!row.has(FieldId::Depends));
        assert!(row.has(FieldId::Constrains));
        assert!(row.has(FieldId::Timestamp));
    }

    #[test]
    fn channel_authoritative_has_no_stubs() {
        assert!(Provenance::ChannelAuthoritative.stub_fields().is_empty());
        assert!(SourceKind::ChannelIndex.stub_fields().is_empty());
    }

    #[test]
    fn display_lists_stub_keys() {
        let provenance = Provenance::UrlDerived {
            stub_fields: FieldSet::LICENSE | FieldSet::TIMESTAMP,
        };
        assert_eq!(provenance.to_string(), "url-derived [license, timestamp]");
    }
}
