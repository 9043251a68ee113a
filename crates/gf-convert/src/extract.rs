//! Zip archive extraction.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use gf_core::{Error, Result};

/// Decompress `archive` into `dest`, creating `dest` if needed.
///
/// Runs on the blocking pool. Entries whose names would escape `dest` are
/// rejected by the zip reader. Every failure surfaces as [`Error::Io`].
pub async fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || extract_blocking(&archive, &dest))
        .await
        .map_err(|e| Error::Internal(format!("extraction task panicked: {e}")))?
}

fn extract_blocking(archive: &PathBuf, dest: &PathBuf) -> Result<()> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(zip_err)?;
    std::fs::create_dir_all(dest)?;

    tracing::debug!(
        archive = %archive.display(),
        dest = %dest.display(),
        entries = zip.len(),
        "Extracting archive"
    );

    zip.extract(dest).map_err(zip_err)?;
    Ok(())
}

fn zip_err(e: zip::result::ZipError) -> Error {
    match e {
        zip::result::ZipError::Io(source) => Error::Io { source },
        other => Error::Io {
            source: io::Error::new(io::ErrorKind::InvalidData, other),
        },
    }
}
