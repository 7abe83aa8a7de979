//! Integration tests for types crate

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sprig_types::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_filename_parsing() {
        let conda = PackageFilename::parse("xtensor-0.25.0-h00ab1b0_0.conda").unwrap();
        assert_eq!(conda.name, "xtensor");
        assert_eq!(conda.version, "0.25.0");
        assert_eq!(conda.build, "h00ab1b0_0");
        assert_eq!(conda.kind, ArchiveKind::Conda);

        // Dashes in the name stay with the name
        let bz2 = PackageFilename::parse("ca-certificates-2024.2.2-hf0a4a13_0.tar.bz2").unwrap();
        assert_eq!(bz2.name, "ca-certificates");
        assert_eq!(bz2.kind, ArchiveKind::TarBz2);

        let wheel = PackageFilename::parse("requests-2.31.0-py3-none-any.whl").unwrap();
        assert_eq!(wheel.name, "requests");
        assert_eq!(wheel.version, "2.31.0");
        assert!(wheel.build.is_empty());

        assert!(PackageFilename::parse("zlib-1.3.zip").is_err());
        assert!(PackageFilename::parse("zlib.conda").is_err());
        assert_eq!(
            strip_archive_extension("zlib-1.3-h0_0.tar.bz2"),
            "zlib-1.3-h0_0"
        );
    }

    #[test]
    fn test_every_constructor_row_is_distinct() {
        let archive = SourceKind::CondaArchive.stub_fields();
        let lock = SourceKind::CondaLock.stub_fields();
        let scm = SourceKind::SourceControl.stub_fields();

        // conda-lock files carry dependencies, archive URLs do not
        assert!(archive.has(FieldId::Depends));
        assert!(!lock.has(FieldId::Depends));
        assert!(scm.contains(archive));
        assert!(scm.has(FieldId::Version));

        assert!(SourceKind::ChannelIndex.stub_fields().is_empty());
        assert!(!archive.has(FieldId::Md5));
    }

    #[test]
    fn test_provenance_display_and_serde() {
        let stubs: FieldSet = [FieldId::License, FieldId::Timestamp].into_iter().collect();
        let provenance = Provenance::UrlDerived { stub_fields: stubs };
        assert_eq!(provenance.to_string(), "url-derived [license, timestamp]");
        assert!(!provenance.is_channel_authoritative());

        let value = serde_json::to_value(provenance).unwrap();
        assert_eq!(value["kind"], "url_derived");
        let back: Provenance = serde_json::from_value(value).unwrap();
        assert_eq!(back, provenance);

        assert_eq!(
            Provenance::ChannelAuthoritative.to_string(),
            "channel-authoritative"
        );
    }

    #[test]
    fn test_record_omits_unknown_optional_keys() {
        let record = RepodataRecord {
            name: "zlib".into(),
            version: "1.3".into(),
            build: "h0_0".into(),
            build_number: 0,
            channel: "https://conda.anaconda.org/conda-forge".into(),
            subdir: "linux-64".into(),
            filename: "zlib-1.3-h0_0.conda".into(),
            url: "https://conda.anaconda.org/conda-forge/linux-64/zlib-1.3-h0_0.conda".into(),
            md5: "0".repeat(32),
            sha256: "0".repeat(64),
            size: 1024,
            depends: vec![],
            constrains: vec![],
            license: None,
            license_family: None,
            timestamp: None,
            track_features: vec![],
            noarch: None,
            python_site_packages_path: None,
            extra: BTreeMap::new(),
        };

        let value = record.to_value().unwrap();
        let object = value.as_object().unwrap();
        for key in ["name", "fn", "md5", "sha256", "size", "depends", "constrains"] {
            assert!(object.contains_key(key), "missing {key}");
        }
        for key in ["license", "timestamp", "track_features"] {
            assert!(!object.contains_key(key), "unexpected {key}");
        }
        assert_eq!(value["depends"], json!([]));
    }

    #[test]
    fn test_index_json_accepts_legacy_shapes() {
        let doc = IndexJson::from_slice(
            br#"{"name": "six", "noarch": true, "track_features": "mkl debug",
                 "arch": null, "platform": null}"#,
        )
        .unwrap();
        assert_eq!(doc.noarch.as_deref(), Some("generic"));
        assert_eq!(
            doc.track_features,
            Some(vec!["mkl".to_string(), "debug".to_string()])
        );
        assert!(doc.extra.contains_key("arch"));

        assert!(IndexJson::from_slice(b"[1, 2]").is_err());
    }
}
