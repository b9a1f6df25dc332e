//! Host path resolution through an optional overlay root
//!
//! A staged root filesystem (the overlay) is consulted before the live
//! host filesystem. Absolute symlinks found in the overlay are re-rooted
//! under it and chased; a relative symlink ends the overlay walk and is
//! validated as-is.

use std::path::{Component, Path, PathBuf};

use crate::config::defaults::MAX_SYMLINK_HOPS;
use crate::error::{FilesystemError, ResolveError};
use crate::infra::filesystem;

/// Resolve `requested` to a concrete host path.
///
/// With no overlay root the path is only checked for existence on the host.
pub fn resolve(target_root: Option<&Path>, requested: &Path) -> Result<PathBuf, ResolveError> {
    let mut host = requested.to_path_buf();

    if let Some(root) = target_root {
        let mut candidate = requested.to_path_buf();
        let mut hops = 0;

        loop {
            let probe = overlay_path(root, &candidate);
            let Some(meta) = filesystem::lstat(&probe).map_err(into_resolve)? else {
                tracing::trace!("{} not staged, falling back to host", probe.display());
                break;
            };

            if !meta.file_type().is_symlink() {
                return Ok(probe);
            }

            let target = filesystem::read_link(&probe).map_err(into_resolve)?;
            if target.is_relative() {
                host = probe;
                break;
            }

            hops += 1;
            if hops > MAX_SYMLINK_HOPS {
                return Err(ResolveError::TooManyLinks {
                    path: requested.to_path_buf(),
                    hops,
                });
            }
            candidate = target;
        }
    }

    match filesystem::stat(&host).map_err(into_resolve)? {
        Some(_) => Ok(host),
        None => Err(ResolveError::NotFound { path: host }),
    }
}

/// Join `candidate` under `root`, never climbing above `root`
pub fn overlay_path(root: &Path, candidate: &Path) -> PathBuf {
    let mut relative = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::ParentDir => {
                relative.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    root.join(relative)
}

fn into_resolve(err: FilesystemError) -> ResolveError {
    match err {
        FilesystemError::Stat { path, error }
        | FilesystemError::ReadLink { path, error }
        | FilesystemError::ReadFile { path, error } => ResolveError::Io { path, error },
    }
}
