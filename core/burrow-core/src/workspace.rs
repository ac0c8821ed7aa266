//! The workspace model: a directory plus its metadata triple.
//!
//! A directory is a workspace iff all three agree:
//! 1. it has the `.burrow/` metadata subdirectory,
//! 2. the metadata holds an identifier marker,
//! 3. the link registry has an entry for that identifier pointing back at
//!    the directory.
//!
//! Partial state is treated as "not a workspace"; validation never repairs.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{BurrowError, Result};
use crate::identity;
use crate::registry;
use crate::storage::{StorageConfig, META_DIR};

const ENTER_TEMPLATE: &str = "#!/bin/sh\n# Sourced by the session shell when this workspace is entered.\n";
const EXIT_TEMPLATE: &str = "#!/bin/sh\n# Run after the last command of a session, before cleanup.\n";

/// A validated workspace: absolute path and identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
    id: String,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.path.join(META_DIR)
    }

    pub fn enter_script(&self) -> PathBuf {
        self.meta_dir().join("enter.sh")
    }

    pub fn exit_script(&self) -> PathBuf {
        self.meta_dir().join("exit.sh")
    }

    pub fn history_file(&self) -> PathBuf {
        self.meta_dir().join("history")
    }

    /// Optional toolchain selector consumed by the buildenv extension.
    pub fn toolchain_file(&self) -> PathBuf {
        self.meta_dir().join("toolchain")
    }

    /// Loads and validates a workspace at `path`.
    ///
    /// Fails with `NotAWorkspace` unless the metadata directory, identifier
    /// marker, and registry link all exist and agree.
    pub fn load(storage: &StorageConfig, path: &Path) -> Result<Self> {
        let path = canonicalize(path)?;
        let meta = path.join(META_DIR);

        if !meta.is_dir() {
            return Err(BurrowError::NotAWorkspace {
                path,
                reason: format!("no {META_DIR} metadata directory"),
            });
        }

        let id = identity::read(&meta)?.ok_or_else(|| BurrowError::NotAWorkspace {
            path: path.clone(),
            reason: "no identifier marker".to_string(),
        })?;

        let target = registry::link_target(storage, &id).map_err(|_| BurrowError::NotAWorkspace {
            path: path.clone(),
            reason: format!("identifier {id} has no registry link"),
        })?;

        if canonicalize(&target)? != path {
            return Err(BurrowError::NotAWorkspace {
                path,
                reason: format!(
                    "registry link {id} points at {}, not here",
                    target.display()
                ),
            });
        }

        Ok(Self { path, id })
    }

    /// Loads a workspace by registry identifier.
    pub fn load_by_id(storage: &StorageConfig, id: &str) -> Result<Self> {
        let target = registry::resolve(storage, id)?;
        Self::load(storage, &target)
    }

    /// Returns true iff `path` is a well-formed workspace.
    pub fn is_workspace(storage: &StorageConfig, path: &Path) -> bool {
        Self::load(storage, path).is_ok()
    }

    /// Registers a directory as a new workspace.
    ///
    /// Creates the metadata directory, template enter/exit scripts, an empty
    /// history file, a fresh identifier, and the registry link. Re-adding a
    /// previously deleted workspace generates a new identifier; any stale
    /// marker from the earlier registration is removed and its identifier
    /// orphaned.
    pub fn init(storage: &StorageConfig, path: &Path) -> Result<Self> {
        let path = canonicalize(path)?;

        if Self::is_workspace(storage, &path) {
            return Err(BurrowError::AlreadyAWorkspace(path));
        }

        let meta = path.join(META_DIR);
        fs_err::create_dir_all(&meta)
            .map_err(|err| BurrowError::io("creating workspace metadata directory", err))?;

        if let Some(stale) = identity::read(&meta)? {
            debug!(id = %stale, path = %path.display(), "orphaning stale identifier marker");
            fs_err::remove_file(meta.join(&stale))
                .map_err(|err| BurrowError::io("removing stale identifier marker", err))?;
        }

        let id = identity::create(&meta)?;

        write_if_absent(&meta.join("enter.sh"), ENTER_TEMPLATE)?;
        write_if_absent(&meta.join("exit.sh"), EXIT_TEMPLATE)?;
        write_if_absent(&meta.join("history"), "")?;

        registry::register(storage, &id, &path)?;
        info!(id = %id, path = %path.display(), "workspace registered");

        Ok(Self { path, id })
    }

    /// Removes a workspace's registry link. Metadata and identifier stay in
    /// place so the directory's contents are untouched.
    pub fn delete(storage: &StorageConfig, path: &Path) -> Result<String> {
        let workspace = Self::load(storage, path)?;
        registry::unregister(storage, workspace.id())?;
        info!(id = %workspace.id, path = %workspace.path.display(), "workspace deleted");
        Ok(workspace.id)
    }
}

fn write_if_absent(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs_err::write(path, contents)
        .map_err(|err| BurrowError::io(format!("writing {}", path.display()), err))
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    fs_err::canonicalize(path).map_err(|err| BurrowError::io(
        format!("resolving path {}", path.display()),
        err,
    ))
}
