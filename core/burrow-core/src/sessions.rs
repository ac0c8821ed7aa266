//! Active-session tracking for a workspace.
//!
//! Each live session is one record in `tmp/<id>/sessions`, one JSON object
//! per line: the shell PID, its process start time (PID-reuse guard), and
//! the entry timestamp. Cleanup is lazy: `reconcile` drops records whose
//! process is gone and rewrites the file, deleting it when nothing survives.
//!
//! Read-modify-write cycles run under an advisory lock directory created
//! with `fs::create_dir` (atomic on all platforms we care about). A lock
//! older than [`LOCK_STALE_SECS`] is treated as abandoned and broken.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BurrowError, Result};
use crate::process;
use crate::storage::StorageConfig;

const LOCK_WAIT_MS: u64 = 10;
const LOCK_TIMEOUT_SECS: u64 = 2;
const LOCK_STALE_SECS: u64 = 10;

/// One live session of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub pid: u32,
    /// Process start time (Unix seconds) captured at record time.
    pub proc_started: Option<u64>,
    pub entered_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn for_pid(pid: u32) -> Self {
        Self {
            pid,
            proc_started: process::get_process_start_time(pid),
            entered_at: Utc::now(),
        }
    }

    fn is_live(&self) -> bool {
        process::is_pid_alive_verified(self.pid, self.proc_started)
    }
}

/// Tracks the active sessions of one workspace identifier.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    storage: StorageConfig,
    id: String,
}

impl SessionTracker {
    pub fn new(storage: &StorageConfig, id: &str) -> Self {
        Self {
            storage: storage.clone(),
            id: id.to_string(),
        }
    }

    fn file(&self) -> PathBuf {
        self.storage.sessions_file(&self.id)
    }

    /// Appends a record for `pid`.
    pub fn record(&self, pid: u32) -> Result<()> {
        self.storage
            .ensure_workspace_tmp(&self.id)
            .map_err(|err| BurrowError::io("creating workspace tmp dir", err))?;

        let _lock = SessionLock::acquire(&self.storage, &self.id)?;
        let mut records = self.read_records()?;
        records.push(SessionRecord::for_pid(pid));
        self.write_records(&records)?;
        debug!(id = %self.id, pid, "session recorded");
        Ok(())
    }

    /// Drops records whose process is gone and rewrites the file with the
    /// surviving set; deletes the file entirely when nothing survives.
    /// Idempotent: reconciling twice yields the same contents.
    pub fn reconcile(&self) -> Result<Vec<SessionRecord>> {
        let _lock = SessionLock::acquire(&self.storage, &self.id)?;
        let records = self.read_records()?;
        let survivors: Vec<SessionRecord> =
            records.into_iter().filter(SessionRecord::is_live).collect();
        self.write_records(&survivors)?;
        Ok(survivors)
    }

    /// Number of currently live recorded sessions.
    pub fn count(&self) -> Result<usize> {
        Ok(self.reconcile()?.len())
    }

    fn read_records(&self) -> Result<Vec<SessionRecord>> {
        let contents = match fs_err::read_to_string(self.file()) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(BurrowError::io("reading sessions file", err)),
        };

        let mut records = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionRecord>(line) {
                Ok(record) => records.push(record),
                // A torn line from an interrupted writer is dropped, not fatal.
                Err(err) => warn!(id = %self.id, error = %err, "skipping malformed session record"),
            }
        }
        Ok(records)
    }

    fn write_records(&self, records: &[SessionRecord]) -> Result<()> {
        let path = self.file();
        if records.is_empty() {
            match fs_err::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(BurrowError::io("removing empty sessions file", err)),
            }
            return Ok(());
        }

        let mut out = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|err| BurrowError::json("serializing session record", err))?;
            out.push_str(&line);
            out.push('\n');
        }
        fs_err::write(&path, out).map_err(|err| BurrowError::io("writing sessions file", err))
    }
}

/// Advisory lock over one workspace's sessions file.
struct SessionLock {
    dir: PathBuf,
}

impl SessionLock {
    fn acquire(storage: &StorageConfig, id: &str) -> Result<Self> {
        storage
            .ensure_workspace_tmp(id)
            .map_err(|err| BurrowError::io("creating workspace tmp dir", err))?;

        let dir = storage.sessions_lock_dir(id);
        let deadline = Instant::now() + Duration::from_secs(LOCK_TIMEOUT_SECS);

        loop {
            match fs_err::create_dir(&dir) {
                Ok(()) => return Ok(Self { dir }),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lock_is_stale(&dir) {
                        warn!(id, "breaking stale sessions lock");
                        let _ = fs_err::remove_dir(&dir);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        warn!(id, "sessions lock timeout; taking over");
                        let _ = fs_err::remove_dir(&dir);
                        continue;
                    }
                    thread::sleep(Duration::from_millis(LOCK_WAIT_MS));
                }
                Err(err) => return Err(BurrowError::io("acquiring sessions lock", err)),
            }
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = fs_err::remove_dir(&self.dir);
    }
}

fn lock_is_stale(dir: &std::path::Path) -> bool {
    match fs_err::metadata(dir).and_then(|m| m.modified()) {
        Ok(modified) => match modified.elapsed() {
            Ok(age) => age.as_secs() > LOCK_STALE_SECS,
            Err(_) => false,
        },
        Err(_) => false,
    }
}
