//! The link registry: one symbolic link per registered workspace.
//!
//! `links/<id>` points at the workspace's absolute path and is the sole
//! enumeration mechanism; there is no separate index to keep in sync.

use std::path::{Path, PathBuf};

use crate::error::{BurrowError, Result};
use crate::identity;
use crate::storage::{StorageConfig, META_DIR};

/// Creates the registry link for a workspace.
///
/// Requires the identifier marker to already exist in the workspace's
/// metadata directory; the registry never invents identities.
pub fn register(storage: &StorageConfig, id: &str, workspace_path: &Path) -> Result<()> {
    let marker = workspace_path.join(META_DIR).join(id);
    if !marker.exists() {
        return Err(BurrowError::NotAWorkspace {
            path: workspace_path.to_path_buf(),
            reason: format!("identifier marker {id} missing"),
        });
    }

    fs_err::create_dir_all(storage.links_dir())
        .map_err(|err| BurrowError::io("creating links directory", err))?;

    let link = storage.link_path(id);
    make_link(workspace_path, &link)
        .map_err(|err| BurrowError::io(format!("creating registry link {}", link.display()), err))
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path) -> std::io::Result<()> {
    fs_err::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_link(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symbolic links are only supported on unix",
    ))
}

/// Removes the registry link for an identifier. Removing an absent link is
/// not an error; unregistration is idempotent.
///
/// The identifier marker is deliberately not consulted: archiving
/// unregisters after the workspace directory (marker included) is already
/// gone, and a dangling link must stay removable.
pub fn unregister(storage: &StorageConfig, id: &str) -> Result<()> {
    let link = storage.link_path(id);
    match fs_err::remove_file(&link) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(BurrowError::io(
            format!("removing registry link {}", link.display()),
            err,
        )),
    }
}

/// Returns true if a registry link exists for the identifier.
pub fn is_registered(storage: &StorageConfig, id: &str) -> bool {
    storage.link_path(id).symlink_metadata().is_ok()
}

/// Reads the raw target of a registry link without validating it.
pub fn link_target(storage: &StorageConfig, id: &str) -> Result<PathBuf> {
    let link = storage.link_path(id);
    fs_err::read_link(&link).map_err(|_| BurrowError::WorkspaceNotFound(id.to_string()))
}

/// Resolves an identifier to a workspace path, requiring the target to be a
/// well-formed workspace whose identifier agrees with the link name.
pub fn resolve(storage: &StorageConfig, id: &str) -> Result<PathBuf> {
    let target = link_target(storage, id)?;

    let found = identity::read(&target.join(META_DIR))?;
    if found.as_deref() != Some(id) {
        return Err(BurrowError::NotAWorkspace {
            path: target,
            reason: match found {
                Some(other) => format!("link {id} points at workspace with identifier {other}"),
                None => format!("link {id} points at a directory with no identifier"),
            },
        });
    }

    Ok(target)
}

/// Enumerates registered workspaces as (identifier, link target) pairs,
/// sorted by identifier. Dangling or foreign entries are skipped.
pub fn entries(storage: &StorageConfig) -> Result<Vec<(String, PathBuf)>> {
    let dir = storage.links_dir();
    let read = match fs_err::read_dir(&dir) {
        Ok(read) => read,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(BurrowError::io("scanning links directory", err)),
    };

    let mut out = Vec::new();
    for entry in read {
        let entry = entry.map_err(|err| BurrowError::io("reading links directory entry", err))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !identity::is_identifier(&name) {
            continue;
        }
        if let Ok(target) = fs_err::read_link(entry.path()) {
            out.push((name, target));
        }
    }

    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
