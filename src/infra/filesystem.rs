//! Filesystem operations
//!
//! Read-only inspection of host paths.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::FilesystemError;

/// Stat a path without following a trailing symlink.
///
/// Returns `Ok(None)` when nothing exists at `path`.
pub fn lstat(path: &Path) -> Result<Option<Metadata>, FilesystemError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FilesystemError::Stat {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}

/// Stat a path, following symlinks.
///
/// Returns `Ok(None)` when the path, or anything it points at, is missing.
pub fn stat(path: &Path) -> Result<Option<Metadata>, FilesystemError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FilesystemError::Stat {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}

/// Read the literal target of a symlink
pub fn read_link(path: &Path) -> Result<PathBuf, FilesystemError> {
    std::fs::read_link(path).map_err(|e| FilesystemError::ReadLink {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lstat_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(lstat(&dir.path().join("missing")).unwrap().is_none());
    }

    #[test]
    fn test_lstat_does_not_follow_links() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink("nowhere", &link).unwrap();

        let meta = lstat(&link).unwrap().expect("link should exist");
        assert!(meta.file_type().is_symlink());
        assert!(stat(&link).unwrap().is_none());
    }

    #[test]
    fn test_read_link_returns_literal_target() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("sh");
        std::os::unix::fs::symlink("busybox", &link).unwrap();
        assert_eq!(read_link(&link).unwrap(), PathBuf::from("busybox"));
    }

    #[test]
    fn test_read_link_on_regular_file_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            read_link(&file),
            Err(FilesystemError::ReadLink { .. })
        ));
    }
}
