//! Repodata merge engine
//!
//! Combines a package model with the manifest the artifact ships with
//! (`info/index.json`) into the canonical record. The function is pure: no
//! I/O, no clock, and the same inputs always serialize to the same bytes.

use sprig_errors::IntegrityError;
use sprig_hash::ArtifactDigest;
use sprig_types::{FieldId, FieldSet, IndexJson, PackageInfo, Provenance, RepodataRecord};

/// Per-field precedence derived from the model's provenance
#[derive(Debug, Clone, Copy)]
struct Precedence {
    url_derived: bool,
    stubs: FieldSet,
}

impl Precedence {
    fn new(provenance: Provenance) -> Self {
        Self {
            url_derived: !provenance.is_channel_authoritative(),
            stubs: provenance.stub_fields(),
        }
    }

    /// Model wins unless the field is a stub; the manifest fills the rest
    fn pick<T: Clone>(self, field: FieldId, model: Option<&T>, manifest: Option<&T>) -> Option<T> {
        let model = if self.stubs.has(field) { None } else { model };
        model.or(manifest).cloned()
    }

    /// Text fields where empty means absent
    fn pick_text(self, field: FieldId, model: &str, manifest: Option<&String>) -> Option<String> {
        let model = non_empty(model);
        self.pick(field, model.as_ref(), manifest)
            .filter(|value| !value.is_empty())
    }

    /// Fields describing where the artifact came from. The artifact cannot
    /// know them, so under URL-derived provenance its manifest is ignored.
    fn pick_external(self, model: Option<&String>, manifest: Option<&String>) -> Option<String> {
        let manifest = if self.url_derived { None } else { manifest };
        model
            .filter(|value| !value.is_empty())
            .or(manifest.filter(|value| !value.is_empty()))
            .cloned()
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Merge a model with its manifest into the canonical record.
///
/// Under channel-authoritative provenance the model wins every conflict and
/// the manifest only fills keys the model lacks, so a deliberately empty
/// `depends` survives. Under URL-derived provenance the stub fields are
/// discarded first and the manifest supplies them, while `url`, `channel`,
/// `fn` and the checksums come from the model alone. `measured` provides the
/// checksums and size of the downloaded artifact for records that would
/// otherwise lack them.
///
/// # Errors
///
/// Returns `IntegrityError::UnsetProvenance` if the model carries no
/// provenance. There is no default policy.
pub fn merge(
    model: &PackageInfo,
    manifest: &IndexJson,
    measured: Option<&ArtifactDigest>,
) -> Result<RepodataRecord, IntegrityError> {
    let provenance = model
        .provenance()
        .ok_or_else(|| IntegrityError::UnsetProvenance {
            package: model.identity(),
            source_kind: model.source().to_string(),
        })?;
    let rule = Precedence::new(provenance);

    let name = non_empty(&model.name)
        .or_else(|| manifest.name.clone())
        .unwrap_or_default();
    let version = rule
        .pick_text(FieldId::Version, &model.version, manifest.version.as_ref())
        .unwrap_or_default();
    let build = rule
        .pick_text(FieldId::Build, &model.build, manifest.build.as_ref())
        .unwrap_or_default();
    let subdir = rule
        .pick_text(FieldId::Subdir, &model.subdir, manifest.subdir.as_ref())
        .unwrap_or_default();

    let channel = rule
        .pick_external(non_empty(&model.channel).as_ref(), manifest.channel.as_ref())
        .unwrap_or_default();
    let url = rule
        .pick_external(non_empty(&model.url).as_ref(), manifest.url.as_ref())
        .unwrap_or_default();
    let filename = rule
        .pick_external(non_empty(&model.filename).as_ref(), manifest.filename.as_ref())
        .unwrap_or_default();

    let md5 = rule
        .pick_external(
            rule.pick(FieldId::Md5, model.md5.as_ref(), None).as_ref(),
            manifest.md5.as_ref(),
        )
        .or_else(|| measured.map(|m| m.md5.clone()))
        .unwrap_or_default();
    let sha256 = rule
        .pick_external(
            rule.pick(FieldId::Sha256, model.sha256.as_ref(), None).as_ref(),
            manifest.sha256.as_ref(),
        )
        .or_else(|| measured.map(|m| m.sha256.clone()))
        .unwrap_or_default();

    // A size of zero is a stub wherever it came from
    let size = rule
        .pick(
            FieldId::Size,
            model.size.filter(|s| *s > 0).as_ref(),
            manifest.size.filter(|s| *s > 0).as_ref(),
        )
        .or_else(|| measured.map(|m| m.size))
        .unwrap_or(0);

    let build_number = rule
        .pick(
            FieldId::BuildNumber,
            model.build_number.as_ref(),
            manifest.build_number.as_ref(),
        )
        .unwrap_or(0);
    let license = rule
        .pick(FieldId::License, model.license.as_ref(), manifest.license.as_ref())
        .filter(|license| !license.is_empty());
    let license_family = rule
        .pick(
            FieldId::LicenseFamily,
            model.license_family.as_ref(),
            manifest.license_family.as_ref(),
        )
        .filter(|family| !family.is_empty());
    let timestamp = rule
        .pick(
            FieldId::Timestamp,
            model.timestamp.as_ref(),
            manifest.timestamp.as_ref(),
        )
        .filter(|ts| *ts > 0);

    let depends = rule
        .pick(FieldId::Depends, model.depends.as_ref(), manifest.depends.as_ref())
        .unwrap_or_default();
    let constrains = rule
        .pick(
            FieldId::Constrains,
            model.constrains.as_ref(),
            manifest.constrains.as_ref(),
        )
        .unwrap_or_default();
    let track_features = rule
        .pick(
            FieldId::TrackFeatures,
            model.track_features.as_ref(),
            manifest.track_features.as_ref(),
        )
        .unwrap_or_default();

    let noarch = rule
        .pick(FieldId::Noarch, model.noarch.as_ref(), manifest.noarch.as_ref())
        .filter(|kind| !kind.is_empty());
    let python_site_packages_path = rule
        .pick(
            FieldId::PythonSitePackagesPath,
            model.python_site_packages_path.as_ref(),
            manifest.python_site_packages_path.as_ref(),
        )
        .filter(|path| !path.is_empty());

    let mut extra = model.extra.clone();
    for (key, value) in &manifest.extra {
        extra.entry(key.clone()).or_insert_with(|| value.clone());
    }

    Ok(RepodataRecord {
        name,
        version,
        build,
        build_number,
        channel,
        subdir,
        filename,
        url,
        md5,
        sha256,
        size,
        depends,
        constrains,
        license,
        license_family,
        timestamp,
        track_features,
        noarch,
        python_site_packages_path,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::from_url;
    use serde_json::json;
    use sprig_types::SourceKind;

    const URL: &str =
        "https://conda.anaconda.org/conda-forge/linux-64/xtensor-0.25.0-h00ab1b0_0.conda";

    fn manifest(value: serde_json::Value) -> IndexJson {
        serde_json::from_value(value).unwrap()
    }

    fn channel_model() -> PackageInfo {
        let mut info = PackageInfo::new(
            "xtensor",
            SourceKind::ChannelIndex,
            Provenance::ChannelAuthoritative,
        );
        info.version = "0.25.0".to_string();
        info.build = "h00ab1b0_0".to_string();
        info.build_number = Some(0);
        info.channel = "https://conda.anaconda.org/conda-forge".to_string();
        info.subdir = "linux-64".to_string();
        info.filename = "xtensor-0.25.0-h00ab1b0_0.conda".to_string();
        info.url = URL.to_string();
        info.md5 = Some("11111111111111111111111111111111".to_string());
        info.sha256 = Some("2".repeat(64));
        info.size = Some(4096);
        info.license = Some("BSD-3-Clause".to_string());
        info.timestamp = Some(1_690_000_000);
        info.depends = Some(Vec::new());
        info.constrains = Some(Vec::new());
        info
    }

    #[test]
    fn channel_authoritative_keeps_patched_empty_depends() {
        let record = merge(
            &channel_model(),
            &manifest(json!({"depends": ["python>=3.8"], "constrains": ["numpy<2"]})),
            None,
        )
        .unwrap();
        assert!(record.depends.is_empty());
        assert!(record.constrains.is_empty());
    }

    #[test]
    fn channel_authoritative_fills_only_absent_keys() {
        let mut model = channel_model();
        model.license_family = None;
        let record = merge(
            &model,
            &manifest(json!({
                "license": "MIT", "license_family": "BSD", "timestamp": 1,
                "platform": "linux", "arch": "x86_64"
            })),
            None,
        )
        .unwrap();
        assert_eq!(record.license.as_deref(), Some("BSD-3-Clause"));
        assert_eq!(record.timestamp, Some(1_690_000_000));
        assert_eq!(record.license_family.as_deref(), Some("BSD"));
        assert_eq!(record.extra.get("arch"), Some(&json!("x86_64")));
    }

    #[test]
    fn url_derived_stubs_yield_to_the_manifest() {
        let mut model = from_url(URL).unwrap();
        model.md5 = Some("11111111111111111111111111111111".to_string());
        let model = {
            let mut narrowed = PackageInfo::new(
                model.name.clone(),
                SourceKind::CondaArchive,
                Provenance::UrlDerived {
                    stub_fields: FieldSet::LICENSE
                        | FieldSet::TIMESTAMP
                        | FieldSet::BUILD_NUMBER
                        | FieldSet::DEPENDS
                        | FieldSet::CONSTRAINS,
                },
            );
            narrowed.version = model.version;
            narrowed.build = model.build;
            narrowed.channel = model.channel;
            narrowed.subdir = model.subdir;
            narrowed.filename = model.filename;
            narrowed.url = model.url;
            narrowed.md5 = model.md5;
            narrowed.license = Some(String::new());
            narrowed.timestamp = Some(0);
            narrowed.build_number = Some(0);
            narrowed.depends = Some(Vec::new());
            narrowed
        };

        let record = merge(
            &model,
            &manifest(json!({
                "license": "MIT", "timestamp": 1_700_000_000, "build_number": 42,
                "depends": ["a"], "url": "https://evil.example/x.conda",
                "channel": "evil", "md5": "99999999999999999999999999999999"
            })),
            None,
        )
        .unwrap();

        assert_eq!(record.license.as_deref(), Some("MIT"));
        assert_eq!(record.timestamp, Some(1_700_000_000));
        assert_eq!(record.build_number, 42);
        assert_eq!(record.depends, vec!["a".to_string()]);
        assert_eq!(record.url, URL);
        assert_eq!(record.channel, "https://conda.anaconda.org/conda-forge");
        assert_eq!(record.md5, "11111111111111111111111111111111");
    }

    #[test]
    fn url_derived_backfills_optional_manifest_keys() {
        let record = merge(
            &from_url(URL).unwrap(),
            &manifest(json!({
                "name": "xtensor", "noarch": "python",
                "python_site_packages_path": "lib/python3.13t/site-packages",
                "size": 0, "track_features": ""
            })),
            Some(&ArtifactDigest::from_data(b"artifact bytes")),
        )
        .unwrap();
        assert_eq!(record.noarch.as_deref(), Some("python"));
        assert_eq!(
            record.python_site_packages_path.as_deref(),
            Some("lib/python3.13t/site-packages")
        );
        assert_eq!(record.size, 14);
        assert!(record.track_features.is_empty());
    }

    #[test]
    fn normalizes_missing_fields() {
        let digest = ArtifactDigest::from_data(b"xtensor");
        let record = merge(&from_url(URL).unwrap(), &IndexJson::default(), Some(&digest)).unwrap();
        assert!(record.depends.is_empty());
        assert!(record.constrains.is_empty());
        assert_eq!(record.md5, digest.md5);
        assert_eq!(record.sha256, digest.sha256);
        assert_eq!(record.size, 7);
        assert_eq!(record.build_number, 0);

        let value = record.to_value().unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object["depends"], json!([]));
        assert!(!object.contains_key("track_features"));
        assert!(!object.contains_key("license"));
        assert!(!object.contains_key("timestamp"));
    }

    #[test]
    fn checksums_are_empty_strings_without_any_source() {
        let record = merge(&from_url(URL).unwrap(), &IndexJson::default(), None).unwrap();
        assert_eq!(record.md5, "");
        assert_eq!(record.sha256, "");
        assert_eq!(record.size, 0);
    }

    #[test]
    fn model_checksum_beats_the_measured_digest() {
        let model = from_url(&format!("{URL}#22222222222222222222222222222222")).unwrap();
        let record = merge(
            &model,
            &IndexJson::default(),
            Some(&ArtifactDigest::from_data(b"x")),
        )
        .unwrap();
        assert_eq!(record.md5, "22222222222222222222222222222222");
        assert_eq!(record.sha256, ArtifactDigest::from_data(b"x").sha256);
    }

    #[test]
    fn manifest_subdir_wins_outside_a_channel_layout() {
        let local = merge(
            &from_url("/home/user/Downloads/zlib-1.3-h0_0.conda").unwrap(),
            &manifest(json!({"subdir": "linux-64"})),
            None,
        )
        .unwrap();
        assert_eq!(local.subdir, "linux-64");
        assert_eq!(local.channel, "file:///home/user/Downloads");

        let mirror = merge(
            &from_url("https://example.com/files/releases/zlib-1.3-h0_0.tar.bz2").unwrap(),
            &manifest(json!({"subdir": "osx-arm64"})),
            None,
        )
        .unwrap();
        assert_eq!(mirror.subdir, "osx-arm64");

        let channel = merge(
            &from_url(URL).unwrap(),
            &manifest(json!({"subdir": "noarch"})),
            None,
        )
        .unwrap();
        assert_eq!(channel.subdir, "linux-64");
    }

    #[test]
    fn merge_is_deterministic() {
        let model = from_url(URL).unwrap();
        let manifest = manifest(json!({
            "license": "BSD-3-Clause", "timestamp": 1_700_000_000,
            "depends": ["libgcc >=13", "libstdcxx >=13"], "zeta": 1, "alpha": 2
        }));
        let digest = ArtifactDigest::from_data(b"bytes");
        let first = merge(&model, &manifest, Some(&digest))
            .unwrap()
            .to_json_pretty()
            .unwrap();
        let second = merge(&model, &manifest, Some(&digest))
            .unwrap()
            .to_json_pretty()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unset_provenance_is_an_integrity_error() {
        let model: PackageInfo =
            serde_json::from_value(json!({"name": "xtensor", "source": "conda_archive"}))
                .unwrap();
        let err = merge(&model, &IndexJson::default(), None).unwrap_err();
        assert!(matches!(err, IntegrityError::UnsetProvenance { .. }));
        assert!(err.to_string().contains("xtensor"));
        assert!(err.to_string().contains("conda_archive"));
    }
}
