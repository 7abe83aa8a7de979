//! Checksums appended to package URLs after `#`

use sprig_hash::is_hex_digest;
use sprig_types::PackageInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Checksum {
    Md5(String),
    Sha256(String),
}

impl Checksum {
    pub(crate) fn apply(self, info: &mut PackageInfo) {
        match self {
            Self::Md5(md5) => info.md5 = Some(md5),
            Self::Sha256(sha256) => info.sha256 = Some(sha256),
        }
    }
}

/// `<md5>`, `md5:<md5>`, `<sha256>` or `sha256:<sha256>`
pub(crate) fn parse(fragment: &str) -> Option<Checksum> {
    let (algo, digest) = match fragment.split_once(':') {
        Some((algo, digest)) => (Some(algo), digest),
        None => (None, fragment),
    };
    let digest = digest.to_ascii_lowercase();
    match algo {
        Some("md5") | None if is_hex_digest(&digest, 16) => Some(Checksum::Md5(digest)),
        Some("sha256") | None if is_hex_digest(&digest, 32) => Some(Checksum::Sha256(digest)),
        _ => None,
    }
}
