//! Persisted per-session context.
//!
//! Instead of scattering session state across inherited environment
//! variables, each session gets one explicit `SessionContext` record written
//! to `tmp/<id>/session-<pid>.json`. Child processes locate it through the
//! single `BURROW_CONTEXT` variable and read everything else from the file.
//! A small set of workspace variables is still exported for user consumption
//! (prompts, scripts).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BurrowError, Result};
use crate::storage::StorageConfig;

/// Workspace root path, exported for user consumption.
pub const ENV_WORKSPACE: &str = "BURROW_WORKSPACE";
/// Workspace identifier, exported for user consumption.
pub const ENV_ID: &str = "BURROW_ID";
/// Workspace scratch directory, exported for user consumption.
pub const ENV_TMPDIR: &str = "BURROW_TMPDIR";
/// Path of the persisted session context file (internal bookkeeping).
pub const ENV_CONTEXT: &str = "BURROW_CONTEXT";

/// Everything a session's child processes need to know about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Workspace root path.
    pub workspace: PathBuf,
    /// Workspace identifier.
    pub id: String,
    /// Workspace scratch directory.
    pub tmp_dir: PathBuf,
    /// PID of the root session shell recorded at push time.
    pub root_pid: u32,
    /// PID of the process that pushed the session; keys the on-disk files,
    /// since it is known before the shell spawns.
    pub pusher_pid: u32,
    /// Control file the root shell's commands write actions into.
    pub control_file: PathBuf,
    pub entered_at: DateTime<Utc>,
}

impl SessionContext {
    /// Path this context is persisted at.
    pub fn file(&self, storage: &StorageConfig) -> PathBuf {
        storage.session_context_file(&self.id, self.pusher_pid)
    }

    pub fn save(&self, storage: &StorageConfig) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|err| BurrowError::json("serializing session context", err))?;
        fs_err::write(self.file(storage), contents)
            .map_err(|err| BurrowError::io("writing session context", err))
    }

    pub fn remove(&self, storage: &StorageConfig) -> Result<()> {
        match fs_err::remove_file(self.file(storage)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(BurrowError::io("removing session context", err)),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs_err::read_to_string(path)
            .map_err(|err| BurrowError::io("reading session context", err))?;
        serde_json::from_str(&contents)
            .map_err(|err| BurrowError::json("parsing session context", err))
    }

    /// Loads the context of the session the calling process is inside of,
    /// located through `BURROW_CONTEXT`. `NotInSession` when unset.
    pub fn current() -> Result<Self> {
        let path = std::env::var_os(ENV_CONTEXT).ok_or(BurrowError::NotInSession)?;
        Self::load(Path::new(&path))
    }

    /// True iff the calling process is a direct child of the root session
    /// shell. Only such processes may unload/switch/reload.
    pub fn invoked_from_root_shell(&self) -> bool {
        crate::process::parent_pid() == self.root_pid
    }

    /// Environment exported into the session shell and its descendants.
    pub fn exported_env(&self, storage: &StorageConfig) -> Vec<(String, String)> {
        vec![
            (
                ENV_WORKSPACE.to_string(),
                self.workspace.to_string_lossy().into_owned(),
            ),
            (ENV_ID.to_string(), self.id.clone()),
            (
                ENV_TMPDIR.to_string(),
                self.tmp_dir.to_string_lossy().into_owned(),
            ),
            (
                ENV_CONTEXT.to_string(),
                self.file(storage).to_string_lossy().into_owned(),
            ),
        ]
    }
}
