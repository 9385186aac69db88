//! Directory roots of the stage file layout

use std::path::{Path, PathBuf};

use crate::path::normalize_path;

pub type MountResult<T> = Result<T, MountError>;

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("Mount root not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl From<MountError> for stagehand_core::Error {
    fn from(err: MountError) -> Self {
        use stagehand_core::Error;

        match err {
            MountError::NotFound(root) => Error::FileNotFound(PathBuf::from(root)),
            MountError::InvalidPath(message) => Error::InvalidConfig { message },
        }
    }
}

/// A host directory addressed with `/`-rooted VFS paths
#[derive(Debug, Clone)]
pub struct FilesystemMount {
    name: String,
    root_path: PathBuf,
}

impl FilesystemMount {
    /// Mount an existing directory
    pub fn new(name: impl Into<String>, root_path: impl AsRef<Path>) -> MountResult<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        if !root_path.exists() {
            return Err(MountError::NotFound(root_path.display().to_string()));
        }
        if !root_path.is_dir() {
            return Err(MountError::InvalidPath(format!("{} is not a directory", root_path.display())));
        }

        Ok(Self {
            name: name.into(),
            root_path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Host path for a VFS path; `..` never escapes the root
    fn resolve_path(&self, path: &str) -> PathBuf {
        let normalized = normalize_path(path);
        self.root_path.join(normalized.trim_start_matches('/'))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).exists()
    }

    /// Host path backing `path`, if it exists
    pub fn local_path(&self, path: &str) -> Option<PathBuf> {
        let abs_path = self.resolve_path(path);
        abs_path.exists().then_some(abs_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = FilesystemMount::new("gone", dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, MountError::NotFound(_)));
        assert!(stagehand_core::Error::from(err).is_not_found());

        std::fs::write(dir.path().join("file.bin"), b"x").unwrap();
        let err = FilesystemMount::new("file", dir.path().join("file.bin")).unwrap_err();
        assert!(matches!(err, MountError::InvalidPath(_)));
    }

    #[test]
    fn test_local_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ba")).unwrap();
        std::fs::write(dir.path().join("ba/ba02f1.dtt"), b"DAT\0").unwrap();

        let mount = FilesystemMount::new("archive", dir.path()).unwrap();
        assert_eq!(mount.name(), "archive");
        assert!(mount.exists("/ba/ba02f1.dtt"));
        assert!(mount.exists("ba\\ba02f1.dtt"));
        assert_eq!(mount.local_path("ba/ba02f1.dtt"), Some(dir.path().join("ba").join("ba02f1.dtt")));
        assert_eq!(mount.local_path("/bm/bm0010.dtt"), None);
    }

    #[test]
    fn test_paths_stay_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(dir.path().join("outside.bin"), b"x").unwrap();

        let mount = FilesystemMount::new("inner", &inner).unwrap();
        assert!(!mount.exists("../outside.bin"));
        assert_eq!(mount.local_path("../outside.bin"), None);
    }
}
