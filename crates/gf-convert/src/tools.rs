//! Converter executable discovery.

use std::path::{Path, PathBuf};

use gf_core::config::{ConverterConfig, ENV_CONVERTER};
use gf_core::{Error, Result};
use serde::Serialize;

/// Availability of the converter, as reported by `check-tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ConverterInfo {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Locate the converter executable.
///
/// Lookup order:
/// 1. `executable` containing a path separator is used as given.
/// 2. `install_root/executable`, when an install root is configured.
/// 3. `executable` on `PATH`.
pub fn resolve_converter(config: &ConverterConfig) -> Result<PathBuf> {
    let exe = Path::new(&config.executable);

    if exe.components().count() > 1 {
        if exe.is_file() {
            return Ok(exe.to_path_buf());
        }
        return Err(not_found(config));
    }

    if let Some(root) = &config.install_root {
        let candidate = root.join(exe);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "Found converter in install root");
            return Ok(candidate);
        }
    }

    match which::which(exe) {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Found converter on PATH");
            Ok(path)
        }
        Err(_) => Err(not_found(config)),
    }
}

fn not_found(config: &ConverterConfig) -> Error {
    Error::Validation(format!(
        "converter {:?} not found (set converter.executable, converter.install_root or {ENV_CONVERTER})",
        config.executable
    ))
}

/// Report whether the converter can be found, without failing.
pub fn check_converter(config: &ConverterConfig) -> ConverterInfo {
    let path = resolve_converter(config).ok();
    ConverterInfo {
        name: config.executable.clone(),
        available: path.is_some(),
        path,
    }
}
