//! Directory listing and source-asset discovery.

use std::path::{Path, PathBuf};

use gf_core::{Error, Result};

/// Immediate entries of `dir` as full paths, sorted by name.
pub async fn dirlist(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut rd = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// First regular file at the root of `dir` whose extension matches
/// `extension` case-insensitively.
///
/// Nested directories are not searched.
pub async fn find_asset(dir: &Path, extension: &str) -> Result<PathBuf> {
    for path in dirlist(dir).await? {
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches {
            continue;
        }
        if tokio::fs::metadata(&path).await?.is_file() {
            return Ok(path);
        }
    }

    Err(Error::MissingAsset {
        extension: extension.to_string(),
        directory: dir.display().to_string(),
    })
}
