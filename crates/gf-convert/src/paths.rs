//! Job-scoped filesystem layout.

use std::path::{Component, Path, PathBuf};

use gf_core::{Error, Result};

/// Ensure `unique_id` names exactly one directory under the projects root.
///
/// Rejects empty values, separators, `.` and `..`.
pub fn validate_unique_id(unique_id: &str) -> Result<()> {
    let mut components = Path::new(unique_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == unique_id => Ok(()),
        _ => Err(Error::Validation(format!(
            "uniqueID must be a single path component, got {unique_id:?}"
        ))),
    }
}

/// Destination directory for a job's extracted archive.
pub fn project_dir(projects_dir: &Path, unique_id: &str) -> Result<PathBuf> {
    validate_unique_id(unique_id)?;
    Ok(projects_dir.join(unique_id))
}

/// Where the converter writes its output for a given source asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPaths {
    /// `<lowercased stem>.<target extension>`, exposed to clients as `glbFileName`.
    pub file_name: String,
    /// Full output path, next to the source asset.
    pub file_path: PathBuf,
    /// Path handed to the converter's `--output`; it appends the extension itself.
    pub output_base: PathBuf,
}

pub fn target_paths(asset: &Path, target_extension: &str) -> Result<TargetPaths> {
    let stem = asset
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::Validation(format!("asset path has no file name: {}", asset.display()))
        })?;
    let dir = asset.parent().unwrap_or_else(|| Path::new(""));
    let file_name = format!("{stem}.{target_extension}");

    Ok(TargetPaths {
        file_path: dir.join(&file_name),
        output_base: dir.join(&stem),
        file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uuid() {
        validate_unique_id("0b6f3c2e-1d4a-4f7e-9a2b-3c4d5e6f7a8b").unwrap();
    }

    #[test]
    fn rejects_traversal_and_separators() {
        for bad in ["", ".", "..", "a/b", "../etc", "/abs", "a/"] {
            assert!(validate_unique_id(bad).is_err(), "{bad:?} was accepted");
        }
    }

    #[test]
    fn project_dir_joins_root() {
        let dir = project_dir(Path::new("/srv/projects"), "abc").unwrap();
        assert_eq!(dir, PathBuf::from("/srv/projects/abc"));
        assert!(project_dir(Path::new("/srv/projects"), "../abc").is_err());
    }

    #[test]
    fn target_paths_lowercase_the_stem() {
        let t = target_paths(Path::new("/p/abc/Robot Arm.FBX"), "glb").unwrap();
        assert_eq!(t.file_name, "robot arm.glb");
        assert_eq!(t.file_path, PathBuf::from("/p/abc/robot arm.glb"));
        assert_eq!(t.output_base, PathBuf::from("/p/abc/robot arm"));
    }

    #[test]
    fn target_paths_keeps_inner_dots() {
        let t = target_paths(Path::new("/p/abc/model.v2.fbx"), "glb").unwrap();
        assert_eq!(t.file_name, "model.v2.glb");
        assert_eq!(t.output_base, PathBuf::from("/p/abc/model.v2"));
    }
}
