//! Archiving inactive workspaces into read-only squashfs images.
//!
//! Per identifier the states are: live (registered, has link) → archived
//! (image + metadata, no link) → mounted (link restored, pointing at an
//! extracted copy under `mnt/<id>`) → back to live (restore) or archived
//! (unmount). Archiving and unmounting require zero active sessions;
//! mounting and restoring require that no registry link exists for the
//! identifier.
//!
//! The external `mksquashfs`/`unsquashfs` utilities are probed once at
//! construction; if either is missing the whole extension is disabled and
//! every operation reports the missing dependency.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::BurrowConfig;
use crate::error::{BurrowError, Result};
use crate::registry;
use crate::sessions::SessionTracker;
use crate::storage::StorageConfig;
use crate::tools;

/// Metadata record kept next to each image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: String,
    /// Workspace path at archive time; restore extracts back here.
    pub original_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    /// Uncompressed size of the workspace at archive time.
    pub size_bytes: u64,
}

/// Resolved external tool paths.
#[derive(Debug, Clone)]
pub struct ArchiveTools {
    pub mksquashfs: PathBuf,
    pub unsquashfs: PathBuf,
}

impl ArchiveTools {
    /// Probes PATH for the squashfs utilities.
    pub fn discover() -> Option<Self> {
        Some(Self {
            mksquashfs: tools::find_in_path("mksquashfs")?,
            unsquashfs: tools::find_in_path("unsquashfs")?,
        })
    }
}

pub struct ArchiveManager {
    storage: StorageConfig,
    compression: String,
    tools: Option<ArchiveTools>,
}

impl ArchiveManager {
    /// Builds the manager, probing for external tools. A missing tool
    /// disables the extension (reported once here; operations then return
    /// `MissingDependency`).
    pub fn new(storage: &StorageConfig, config: &BurrowConfig) -> Self {
        let tools = ArchiveTools::discover();
        if tools.is_none() {
            warn!("mksquashfs/unsquashfs not found; archive extension disabled");
        }
        Self::with_tools(storage, config, tools)
    }

    /// Injection point for tests and exotic setups.
    pub fn with_tools(
        storage: &StorageConfig,
        config: &BurrowConfig,
        tools: Option<ArchiveTools>,
    ) -> Self {
        Self {
            storage: storage.clone(),
            compression: config.archive.compression.clone(),
            tools,
        }
    }

    pub fn available(&self) -> bool {
        self.tools.is_some()
    }

    fn require_tools(&self) -> Result<&ArchiveTools> {
        self.tools.as_ref().ok_or_else(|| {
            BurrowError::MissingDependency("mksquashfs/unsquashfs".to_string())
        })
    }

    /// True iff an image and metadata record exist for the identifier.
    pub fn is_archived(&self, id: &str) -> bool {
        self.storage.archive_image(id).is_file() && self.storage.archive_meta(id).is_file()
    }

    /// True iff the identifier's link points at the archive extraction area.
    pub fn is_mounted(&self, id: &str) -> bool {
        registry::link_target(&self.storage, id)
            .map(|target| target == self.storage.mount_point(id))
            .unwrap_or(false)
    }

    /// Compresses an inactive workspace into an image, then removes the
    /// workspace directory and its registry link.
    pub fn archive(&self, id: &str, description: Option<String>) -> Result<ArchiveRecord> {
        let tools = self.require_tools()?;

        // A mounted workspace's link points into the mount area; re-imaging
        // the extraction would overwrite the image and lose the recorded
        // original path.
        if self.is_mounted(id) {
            return Err(BurrowError::Mounted(id.to_string()));
        }

        let path = registry::resolve(&self.storage, id)?;
        let tracker = SessionTracker::new(&self.storage, id);
        let count = tracker.count()?;
        if count > 0 {
            return Err(BurrowError::SessionsActive {
                id: id.to_string(),
                count,
            });
        }

        self.storage
            .ensure_archive_dirs()
            .map_err(|err| BurrowError::io("creating archive directories", err))?;

        let image = self.storage.archive_image(id);
        let result = tools::run(
            &tools.mksquashfs,
            &[
                &path.to_string_lossy(),
                &image.to_string_lossy(),
                "-comp",
                &self.compression,
                "-noappend",
                "-quiet",
            ],
        );
        if let Err(err) = result {
            let _ = fs_err::remove_file(&image);
            return Err(err);
        }

        let record = ArchiveRecord {
            id: id.to_string(),
            original_path: path.clone(),
            description,
            created: Utc::now(),
            size_bytes: directory_size(&path),
        };
        self.write_record(&record)?;

        fs_err::remove_dir_all(&path)
            .map_err(|err| BurrowError::io("removing archived workspace directory", err))?;
        registry::unregister(&self.storage, id)?;
        info!(id, image = %image.display(), "workspace archived");
        Ok(record)
    }

    /// Extracts an archive back to its original path, recreates the link,
    /// and removes the image and metadata (no orphans).
    pub fn restore(&self, id: &str) -> Result<ArchiveRecord> {
        let tools = self.require_tools()?;
        let record = self.read_record(id)?;

        if registry::is_registered(&self.storage, id) {
            return Err(BurrowError::AlreadyLive(id.to_string()));
        }

        self.extract(tools, id, &record.original_path)?;
        registry::register(&self.storage, id, &record.original_path)?;

        fs_err::remove_file(self.storage.archive_image(id))
            .map_err(|err| BurrowError::io("removing restored image", err))?;
        fs_err::remove_file(self.storage.archive_meta(id))
            .map_err(|err| BurrowError::io("removing restored metadata", err))?;
        info!(id, path = %record.original_path.display(), "workspace restored");
        Ok(record)
    }

    /// Extracts an archive under `mnt/<id>` and points the registry link at
    /// the copy. The image and metadata stay in place.
    pub fn mount(&self, id: &str) -> Result<PathBuf> {
        let tools = self.require_tools()?;
        let _record = self.read_record(id)?;

        if registry::is_registered(&self.storage, id) {
            return Err(BurrowError::AlreadyLive(id.to_string()));
        }

        let mount_point = self.storage.mount_point(id);
        self.extract(tools, id, &mount_point)?;
        registry::register(&self.storage, id, &mount_point)?;
        info!(id, mount = %mount_point.display(), "archive mounted");
        Ok(mount_point)
    }

    /// Tears down a mounted archive: removes the extraction and the link,
    /// returning the identifier to the archived state.
    pub fn unmount(&self, id: &str) -> Result<()> {
        self.require_tools()?;

        if !self.is_mounted(id) {
            return Err(BurrowError::NotArchived(id.to_string()));
        }

        let tracker = SessionTracker::new(&self.storage, id);
        let count = tracker.count()?;
        if count > 0 {
            return Err(BurrowError::SessionsActive {
                id: id.to_string(),
                count,
            });
        }

        registry::unregister(&self.storage, id)?;
        fs_err::remove_dir_all(self.storage.mount_point(id))
            .map_err(|err| BurrowError::io("removing mount extraction", err))?;
        info!(id, "archive unmounted");
        Ok(())
    }

    /// Enumerates archive records, sorted by identifier.
    pub fn list(&self) -> Result<Vec<ArchiveRecord>> {
        let dir = self.storage.archive_meta_dir();
        let read = match fs_err::read_dir(&dir) {
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(BurrowError::io("scanning archive metadata", err)),
        };

        let mut records = Vec::new();
        for entry in read {
            let entry =
                entry.map_err(|err| BurrowError::io("reading archive metadata entry", err))?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                match read_record_file(&path) {
                    Ok(record) => records.push(record),
                    Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable archive record"),
                }
            }
        }

        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    fn extract(&self, tools: &ArchiveTools, id: &str, dest: &Path) -> Result<()> {
        let image = self.storage.archive_image(id);
        tools::run(
            &tools.unsquashfs,
            &["-d", &dest.to_string_lossy(), &image.to_string_lossy()],
        )
    }

    fn read_record(&self, id: &str) -> Result<ArchiveRecord> {
        if !self.is_archived(id) {
            return Err(BurrowError::NotArchived(id.to_string()));
        }
        read_record_file(&self.storage.archive_meta(id))
    }

    fn write_record(&self, record: &ArchiveRecord) -> Result<()> {
        let contents = serde_json::to_string_pretty(record)
            .map_err(|err| BurrowError::json("serializing archive record", err))?;
        fs_err::write(self.storage.archive_meta(&record.id), contents)
            .map_err(|err| BurrowError::io("writing archive metadata", err))
    }
}

fn read_record_file(path: &Path) -> Result<ArchiveRecord> {
    let contents = fs_err::read_to_string(path)
        .map_err(|err| BurrowError::io("reading archive metadata", err))?;
    serde_json::from_str(&contents)
        .map_err(|err| BurrowError::json("parsing archive metadata", err))
}

fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}
