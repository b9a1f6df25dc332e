//! Host directory mirroring
//!
//! Walks a host subtree and feeds every entry through the manifest's own
//! insertion operations. Symlinks whose target is missing are skipped with
//! a warning; any other failure, including a link that cannot be
//! followed, aborts the walk and is returned wrapped in
//! [`ManifestError::Walk`], which callers are free to recover from.

use std::path::Path;

use walkdir::WalkDir;

use crate::core::manifest::Manifest;
use crate::core::tree;
use crate::error::ManifestError;
use crate::infra::filesystem;

/// How a walked host path becomes a virtual path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMapping {
    /// Keep the host path, rooting relative ones at `/`
    Absolute,
    /// Strip the walk root, placing its contents at `/`
    Relative,
}

impl PathMapping {
    /// Virtual path for `host`, found while walking `root`
    pub fn virtual_path(self, root: &Path, host: &Path) -> String {
        match self {
            Self::Absolute => tree::clean_path(&host.to_string_lossy()),
            Self::Relative => {
                let relative = host.strip_prefix(root).unwrap_or(host);
                tree::clean_path(&relative.to_string_lossy())
            }
        }
    }
}

/// Mirror `root` into the manifest's root filesystem
pub fn walk(manifest: &mut Manifest, root: &Path, mapping: PathMapping) -> Result<(), ManifestError> {
    tracing::debug!("walking {} ({mapping:?})", root.display());
    walk_entries(manifest, root, mapping).map_err(|e| ManifestError::Walk {
        root: root.to_path_buf(),
        source: Box::new(e),
    })
}

fn walk_entries(
    manifest: &mut Manifest,
    root: &Path,
    mapping: PathMapping,
) -> Result<(), ManifestError> {
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| ManifestError::WalkIo {
            path: e.path().unwrap_or(root).to_path_buf(),
            error: e.to_string(),
        })?;

        let host = entry.path();
        let host_str = host.to_string_lossy();
        let virtual_path = mapping.virtual_path(root, host);

        if entry.file_type().is_symlink() {
            match filesystem::stat(host) {
                Ok(Some(_)) => manifest.add_link(&virtual_path, &host_str)?,
                Ok(None) => {
                    tracing::warn!("skipping broken symlink {}", host.display());
                }
                Err(e) => {
                    return Err(ManifestError::WalkIo {
                        path: host.to_path_buf(),
                        error: e.to_string(),
                    })
                }
            }
        } else if entry.file_type().is_dir() {
            if let Err(e) = manifest.root_mut().mk_dir_path(&virtual_path) {
                tracing::error!("directory {} is conflicting with an existing file", host.display());
                return Err(e);
            }
        } else {
            manifest.add_file(&virtual_path, &host_str)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_mapping_roots_relative_paths() {
        let root = Path::new("static");
        assert_eq!(
            PathMapping::Absolute.virtual_path(root, Path::new("static/css/site.css")),
            "/static/css/site.css"
        );
        assert_eq!(
            PathMapping::Absolute.virtual_path(root, Path::new("./static")),
            "/static"
        );
    }

    #[test]
    fn test_absolute_mapping_keeps_absolute_paths() {
        let root = Path::new("/srv/www");
        assert_eq!(
            PathMapping::Absolute.virtual_path(root, Path::new("/srv/www/index.html")),
            "/srv/www/index.html"
        );
    }

    #[test]
    fn test_relative_mapping_strips_root() {
        let root = Path::new("/build/rootfs");
        assert_eq!(
            PathMapping::Relative.virtual_path(root, Path::new("/build/rootfs/etc/hosts")),
            "/etc/hosts"
        );
        assert_eq!(PathMapping::Relative.virtual_path(root, root), "/");
    }
}
