//! Conda package archives (`.tar.bz2` and `.conda`)

use async_compression::tokio::bufread::BzDecoder;
use async_compression::tokio::write::BzEncoder;
use sprig_errors::{Error, PackageError, StorageError};
use sprig_types::{strip_archive_extension, ArchiveKind};
use std::fmt::Display;
use std::io::{Read, Write};
use std::path::{Component, Path};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};

/// zstd level used when writing `.conda` members
const CONDA_ZSTD_LEVEL: i32 = 3;

/// Extract a package archive into `dest`
///
/// The kind is chosen from the file name suffix. `dest` is created if needed.
///
/// # Errors
///
/// Returns an error if:
/// - The suffix is not `.conda` or `.tar.bz2`
/// - Decompression or unpacking fails
/// - An entry would land outside `dest`
pub async fn extract_package(archive: &Path, dest: &Path) -> Result<(), Error> {
    let filename = archive
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let unsupported = || PackageError::UnsupportedKind {
        name: filename.to_string(),
    };
    let kind = ArchiveKind::from_filename(filename).ok_or_else(unsupported)?;

    fs::create_dir_all(dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?;

    match kind {
        ArchiveKind::TarBz2 => extract_tar_bz2(archive, dest).await,
        ArchiveKind::Conda => extract_conda(archive, dest).await,
        ArchiveKind::Wheel => Err(unsupported().into()),
    }
}

async fn extract_tar_bz2(archive: &Path, dest: &Path) -> Result<(), Error> {
    // Decompress to a scratch tar first; unpacking is synchronous
    let temp_dir = tempfile::tempdir()?;
    let tar_path = temp_dir.path().join("archive.tar");
    {
        let input = File::open(archive)
            .await
            .map_err(|e| Error::io_with_path(&e, archive))?;
        let mut output = File::create(&tar_path).await?;
        let mut decoder = BzDecoder::new(BufReader::new(input));
        tokio::io::copy(&mut decoder, &mut output)
            .await
            .map_err(|e| extraction_failed(archive, format!("bzip2: {e}")))?;
        output.flush().await?;
    }

    let archive_name = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&tar_path)?;
        let result = unpack_tar(file, &dest).map_err(|e| wrap(&archive_name, e));
        drop(temp_dir);
        result
    })
    .await
    .map_err(|e| Error::internal(format!("extract task failed: {e}")))?
}

async fn extract_conda(archive: &Path, dest: &Path) -> Result<(), Error> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive).map_err(|e| Error::io_with_path(&e, &archive))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| extraction_failed(&archive, e))?;

        let mut saw_info = false;
        for index in 0..zip.len() {
            let member = zip
                .by_index(index)
                .map_err(|e| extraction_failed(&archive, e))?;
            let name = member.name().to_string();
            if !name.ends_with(".tar.zst") {
                continue;
            }
            if name.starts_with("info-") {
                saw_info = true;
            } else if !name.starts_with("pkg-") {
                continue;
            }

            let decoder = zstd::stream::read::Decoder::new(member)
                .map_err(|e| extraction_failed(&archive, format!("{name}: {e}")))?;
            unpack_tar(decoder, &dest).map_err(|e| wrap(&archive, e))?;
        }

        if saw_info {
            Ok(())
        } else {
            Err(PackageError::InvalidFormat {
                message: format!("{} has no info-*.tar.zst member", archive.display()),
            }
            .into())
        }
    })
    .await
    .map_err(|e| Error::internal(format!("extract task failed: {e}")))?
}

/// Unpack a tar stream, rejecting entries that escape `dest`
fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<(), Error> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.set_unpack_xattrs(false);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        }) {
            return Err(PackageError::InvalidFormat {
                message: format!("archive entry escapes destination: {}", path.display()),
            }
            .into());
        }

        entry.unpack_in(dest)?;
    }

    Ok(())
}

/// Keep format errors as they are; everything else becomes an extraction failure
fn wrap(archive: &Path, error: Error) -> Error {
    match error {
        Error::Package(_) => error,
        other => extraction_failed(archive, other),
    }
}

fn extraction_failed(archive: &Path, message: impl Display) -> Error {
    StorageError::ExtractionFailed {
        archive: archive.display().to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Write a `.tar.bz2` package from the contents of `src`
///
/// # Errors
///
/// Returns an error if reading `src` or writing `out` fails.
pub async fn create_tar_bz2(src: &Path, out: &Path) -> Result<(), Error> {
    let root = src.to_path_buf();
    let tar_bytes = tokio::task::spawn_blocking(move || tar_tree(&root, |_| true))
        .await
        .map_err(|e| Error::internal(format!("archive task failed: {e}")))??;

    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent).await?;
    }
    let file = File::create(out)
        .await
        .map_err(|e| Error::io_with_path(&e, out))?;
    let mut encoder = BzEncoder::new(file);
    encoder.write_all(&tar_bytes).await?;
    encoder.shutdown().await?;
    Ok(())
}

/// Write a `.conda` package from the contents of `src`
///
/// `src/info` goes into `info-<stem>.tar.zst`, everything else into
/// `pkg-<stem>.tar.zst`.
///
/// # Errors
///
/// Returns an error if reading `src` or writing `out` fails.
pub async fn create_conda(src: &Path, out: &Path) -> Result<(), Error> {
    let filename = out
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let stem = strip_archive_extension(filename).to_string();
    let root = src.to_path_buf();
    let out = out.to_path_buf();

    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent).await?;
    }

    tokio::task::spawn_blocking(move || {
        let info_tar = tar_tree(&root, |top| top == "info")?;
        let pkg_tar = tar_tree(&root, |top| top != "info")?;

        let file = std::fs::File::create(&out).map_err(|e| Error::io_with_path(&e, &out))?;
        let mut zip = zip::ZipWriter::new(file);
        let zip_err = |e: zip::result::ZipError| Error::internal(format!("zip: {e}"));

        zip.start_file("metadata.json", stored()).map_err(zip_err)?;
        zip.write_all(br#"{"conda_pkg_format_version": 2}"#)?;

        zip.start_file(format!("pkg-{stem}.tar.zst"), stored())
            .map_err(zip_err)?;
        zip.write_all(&zstd::encode_all(&pkg_tar[..], CONDA_ZSTD_LEVEL)?)?;

        zip.start_file(format!("info-{stem}.tar.zst"), stored())
            .map_err(zip_err)?;
        zip.write_all(&zstd::encode_all(&info_tar[..], CONDA_ZSTD_LEVEL)?)?;

        zip.finish().map_err(zip_err)?;
        Ok::<(), Error>(())
    })
    .await
    .map_err(|e| Error::internal(format!("archive task failed: {e}")))?
}

/// `.conda` members are already compressed
fn stored() -> zip::write::SimpleFileOptions {
    zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored)
}

/// Tar the top-level entries of `root` accepted by `include`
fn tar_tree(root: &Path, include: impl Fn(&str) -> bool) -> Result<Vec<u8>, Error> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.mode(tar::HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    for (name, path) in sorted_entries(root)? {
        if include(&name) {
            add_to_tar(&mut builder, &path, Path::new(&name))?;
        }
    }

    Ok(builder.into_inner()?)
}

fn sorted_entries(dir: &Path) -> Result<Vec<(String, std::path::PathBuf)>, Error> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::io_with_path(&e, dir))? {
        let entry = entry?;
        entries.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }
    entries.sort();
    Ok(entries)
}

/// Recursively add `path` to the archive under `tar_path`
fn add_to_tar<W: Write>(
    builder: &mut tar::Builder<W>,
    path: &Path,
    tar_path: &Path,
) -> Result<(), Error> {
    let metadata = std::fs::symlink_metadata(path).map_err(|e| Error::io_with_path(&e, path))?;

    if metadata.is_dir() {
        builder.append_dir(tar_path, path)?;
        for (name, child) in sorted_entries(path)? {
            add_to_tar(builder, &child, &tar_path.join(name))?;
        }
    } else if metadata.is_file() {
        let mut file = std::fs::File::open(path).map_err(|e| Error::io_with_path(&e, path))?;
        builder.append_file(tar_path, &mut file)?;
    } else if metadata.file_type().is_symlink() {
        let target = std::fs::read_link(path)?;
        let mut header = tar::Header::new_gnu();
        header.set_metadata(&metadata);
        header.set_entry_type(tar::EntryType::Symlink);
        builder.append_link(&mut header, tar_path, &target)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("info")).await.unwrap();
        fs::write(root.join("info/index.json"), br#"{"name":"demo"}"#)
            .await
            .unwrap();
        fs::create_dir_all(root.join("lib")).await.unwrap();
        fs::write(root.join("lib/libdemo.so"), b"binary").await.unwrap();
    }

    #[tokio::test]
    async fn tar_bz2_extracts_full_tree() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        sample_tree(&src).await;

        let archive = temp.path().join("demo-1.0-0.tar.bz2");
        create_tar_bz2(&src, &archive).await.unwrap();

        let dest = temp.path().join("out");
        extract_package(&archive, &dest).await.unwrap();
        assert_eq!(
            fs::read(dest.join("info/index.json")).await.unwrap(),
            br#"{"name":"demo"}"#
        );
        assert!(dest.join("lib/libdemo.so").exists());
    }

    #[tokio::test]
    async fn conda_extracts_info_and_pkg_members() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        sample_tree(&src).await;

        let archive = temp.path().join("demo-1.0-0.conda");
        create_conda(&src, &archive).await.unwrap();

        let dest = temp.path().join("out");
        extract_package(&archive, &dest).await.unwrap();
        assert!(dest.join("info/index.json").exists());
        assert!(dest.join("lib/libdemo.so").exists());
        assert!(!dest.join("metadata.json").exists());
    }

    #[tokio::test]
    async fn rejects_unknown_suffix() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("demo-1.0-0.zip");
        fs::write(&archive, b"").await.unwrap();
        let err = extract_package(&archive, &temp.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Package(PackageError::UnsupportedKind { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_garbage_bytes() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("demo-1.0-0.tar.bz2");
        fs::write(&archive, b"definitely not bzip2").await.unwrap();
        let err = extract_package(&archive, &temp.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::ExtractionFailed { .. })
        ));
    }

    #[test]
    fn rejects_traversal_entries() {
        let mut builder = tar::Builder::new(Vec::new());
        let data = b"evil";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        // `append_data` refuses `..`, so write the name bytes directly
        let name = b"../evil.txt";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_cksum();
        builder.append(&header, &data[..]).unwrap();
        let bytes = builder.into_inner().unwrap();

        let temp = tempdir().unwrap();
        let err = unpack_tar(&bytes[..], temp.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::Package(PackageError::InvalidFormat { .. })
        ));
        assert!(!temp.path().parent().unwrap().join("evil.txt").exists());
    }
}
