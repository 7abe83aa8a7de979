//! Models built from a package URL

use crate::checksum_fragment;
use sprig_errors::{Error, NetworkError, PackageError};
use sprig_types::{
    is_known_subdir, ArchiveKind, FieldSet, PackageFilename, PackageInfo, Provenance, SourceKind,
};
use url::Url;

/// Build a model from a package URL or absolute path.
///
/// Name, version and build come from the file name. When the directory
/// holding the file is a platform directory (`linux-64`, `noarch`, ...) it is
/// the subdir and its parent the channel; otherwise the whole directory is the
/// channel and the subdir is left as a stub for the manifest to fill. A
/// `#<md5>` or `#sha256:<hex>` fragment fills the matching checksum.
/// Everything else is a stub per the row for the URL's package kind.
///
/// # Errors
///
/// Returns an error if the URL does not parse, does not name a package file,
/// or carries an unrecognized fragment.
pub fn from_url(raw: &str) -> Result<PackageInfo, Error> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("git+") {
        return from_source_control(raw, rest);
    }

    let (location, fragment) = match raw.split_once('#') {
        Some((location, fragment)) => (location, Some(fragment)),
        None => (raw, None),
    };

    let mut parsed = parse_location(location)?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    let url = parsed.as_str().to_string();

    let (dir, filename) = url
        .rsplit_once('/')
        .filter(|(_, filename)| !filename.is_empty())
        .ok_or_else(|| PackageError::InvalidFilename { name: url.clone() })?;
    let parts = PackageFilename::parse(filename)?;

    let (channel, subdir) = if parts.kind == ArchiveKind::Wheel {
        (dir.to_string(), "noarch".to_string())
    } else {
        match dir.rsplit_once('/') {
            Some((channel, subdir))
                if is_known_subdir(subdir) && !channel.ends_with(['/', ':']) =>
            {
                (channel.to_string(), subdir.to_string())
            }
            _ => (dir.to_string(), String::new()),
        }
    };

    let source = if parts.kind == ArchiveKind::Wheel {
        SourceKind::Wheel
    } else {
        SourceKind::CondaArchive
    };

    let mut stub_fields = source.stub_fields();
    if subdir.is_empty() {
        stub_fields |= FieldSet::SUBDIR;
    }

    let mut info = PackageInfo::new(parts.name, source, Provenance::UrlDerived { stub_fields });
    info.version = parts.version;
    info.build = parts.build;
    info.channel = channel;
    info.subdir = subdir;
    info.filename = filename.to_string();
    info.url = url.clone();

    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        let checksum = checksum_fragment::parse(fragment).ok_or_else(|| {
            PackageError::InvalidFormat {
                message: format!("unrecognized checksum fragment in {raw}"),
            }
        })?;
        checksum.apply(&mut info);
    }

    Ok(info)
}

fn parse_location(location: &str) -> Result<Url, Error> {
    match Url::parse(location) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) if location.starts_with('/') => {
            Url::from_file_path(location)
                .map_err(|()| NetworkError::InvalidUrl(location.to_string()).into())
        }
        Err(e) => Err(NetworkError::InvalidUrl(format!("{location}: {e}")).into()),
    }
}

/// `git+https://host/org/name.git@rev`: only the name is derivable
fn from_source_control(raw: &str, rest: &str) -> Result<PackageInfo, Error> {
    let location = rest.split('#').next().unwrap_or(rest);
    let parsed =
        Url::parse(location).map_err(|e| NetworkError::InvalidUrl(format!("{raw}: {e}")))?;

    let last = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let name = last.split('@').next().unwrap_or(last);
    let name = name.strip_suffix(".git").unwrap_or(name);
    if name.is_empty() {
        return Err(PackageError::InvalidFilename {
            name: raw.to_string(),
        }
        .into());
    }

    let mut info = PackageInfo::new(
        name,
        SourceKind::SourceControl,
        Provenance::url_derived(SourceKind::SourceControl),
    );
    info.url = raw.to_string();
    Ok(info)
}
