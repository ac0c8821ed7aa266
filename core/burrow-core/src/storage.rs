//! Storage configuration and path management for burrow.
//!
//! This module provides a centralized `StorageConfig` struct that manages all
//! file paths for burrow data. Production code uses `StorageConfig::from_env()`
//! which points to `~/.burrow/` unless `BURROW_HOME` overrides it. Tests use
//! `StorageConfig::with_root(temp_dir)` for isolation.

use std::path::{Path, PathBuf};

use crate::error::{BurrowError, Result};

/// Environment variable overriding the burrow data root.
pub const HOME_ENV: &str = "BURROW_HOME";

/// Environment variable overriding the archive base directory.
pub const ARCHIVE_ENV: &str = "BURROW_ARCHIVE_DIR";

/// Name of the per-workspace metadata subdirectory.
pub const META_DIR: &str = ".burrow";

/// Central configuration for all burrow storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all burrow data (default: ~/.burrow)
    root: PathBuf,
    /// Base directory for archive images and metadata (default: root/archive)
    archive_base: PathBuf,
}

impl StorageConfig {
    /// Resolves the storage root from the environment, falling back to
    /// `~/.burrow`.
    pub fn from_env() -> Result<Self> {
        let root = match std::env::var_os(HOME_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir().ok_or(BurrowError::NoHomeDir)?.join(".burrow"),
        };
        let archive_base = match std::env::var_os(ARCHIVE_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => root.join("archive"),
        };
        Ok(Self { root, archive_base })
    }

    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        let archive_base = root.join("archive");
        Self { root, archive_base }
    }

    /// Creates a StorageConfig with both custom root and archive base.
    pub fn with_roots(root: PathBuf, archive_base: PathBuf) -> Self {
        Self { root, archive_base }
    }

    /// Returns the root directory for burrow data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Global Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to config.toml (user preferences).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to logs/ directory (rolling CLI log files).
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registry Directories
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to links/ directory (one symlink per registered workspace).
    pub fn links_dir(&self) -> PathBuf {
        self.root.join("links")
    }

    /// Path to tmp/ directory (per-identifier scratch state).
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Path to mnt/ directory (extraction points for mounted archives).
    pub fn mnt_dir(&self) -> PathBuf {
        self.root.join("mnt")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Per-Identifier Paths
    // ─────────────────────────────────────────────────────────────────────────────

    /// Registry link for a workspace identifier.
    pub fn link_path(&self, id: &str) -> PathBuf {
        self.links_dir().join(id)
    }

    /// Scratch directory for a workspace identifier.
    pub fn workspace_tmp_dir(&self, id: &str) -> PathBuf {
        self.tmp_dir().join(id)
    }

    /// Active-session record file for a workspace identifier.
    pub fn sessions_file(&self, id: &str) -> PathBuf {
        self.workspace_tmp_dir(id).join("sessions")
    }

    /// Advisory lock directory guarding the session file's read-modify-write.
    pub fn sessions_lock_dir(&self, id: &str) -> PathBuf {
        self.workspace_tmp_dir(id).join("sessions.lock")
    }

    /// Control file for one push of a workspace, keyed by the pushing pid.
    pub fn control_file(&self, id: &str, pid: u32) -> PathBuf {
        self.workspace_tmp_dir(id).join(format!("control-{pid}"))
    }

    /// Persisted session context, keyed by the session shell pid.
    pub fn session_context_file(&self, id: &str, pid: u32) -> PathBuf {
        self.workspace_tmp_dir(id)
            .join(format!("session-{pid}.json"))
    }

    /// Generated shell startup file for one session.
    pub fn session_rc_file(&self, id: &str, pid: u32) -> PathBuf {
        self.workspace_tmp_dir(id).join(format!("rc-{pid}.sh"))
    }

    /// Extraction point for a mounted archive.
    pub fn mount_point(&self, id: &str) -> PathBuf {
        self.mnt_dir().join(id)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Archive Paths
    // ─────────────────────────────────────────────────────────────────────────────

    /// Base directory for archive data.
    pub fn archive_base(&self) -> &Path {
        &self.archive_base
    }

    /// Directory holding compressed workspace images.
    pub fn archive_images_dir(&self) -> PathBuf {
        self.archive_base.join("images")
    }

    /// Directory holding archive metadata records.
    pub fn archive_meta_dir(&self) -> PathBuf {
        self.archive_base.join("meta")
    }

    /// Compressed image for a workspace identifier.
    pub fn archive_image(&self, id: &str) -> PathBuf {
        self.archive_images_dir().join(format!("{id}.img"))
    }

    /// Metadata record for an archived workspace identifier.
    pub fn archive_meta(&self, id: &str) -> PathBuf {
        self.archive_meta_dir().join(format!("{id}.json"))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directory Creation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Ensures the root directory and standard subdirectories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.root)?;
        fs_err::create_dir_all(self.links_dir())?;
        fs_err::create_dir_all(self.tmp_dir())?;
        fs_err::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    /// Ensures a workspace's scratch directory exists.
    pub fn ensure_workspace_tmp(&self, id: &str) -> std::io::Result<()> {
        fs_err::create_dir_all(self.workspace_tmp_dir(id))
    }

    /// Ensures the archive directories exist.
    pub fn ensure_archive_dirs(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(self.archive_images_dir())?;
        fs_err::create_dir_all(self.archive_meta_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_with_root_sets_custom_path() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/test-burrow"));
        assert_eq!(config.root(), Path::new("/tmp/test-burrow"));
    }

    #[test]
    fn test_archive_base_defaults_under_root() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/burrow"));
        assert_eq!(config.archive_base(), Path::new("/tmp/burrow/archive"));
    }

    #[test]
    fn test_with_roots_sets_both_paths() {
        let config =
            StorageConfig::with_roots(PathBuf::from("/tmp/burrow"), PathBuf::from("/tmp/arc"));
        assert_eq!(config.archive_base(), Path::new("/tmp/arc"));
    }

    #[test]
    fn test_link_path() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/burrow"));
        assert_eq!(
            config.link_path("1234567890"),
            PathBuf::from("/tmp/burrow/links/1234567890")
        );
    }

    #[test]
    fn test_sessions_file_path() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/burrow"));
        assert_eq!(
            config.sessions_file("42"),
            PathBuf::from("/tmp/burrow/tmp/42/sessions")
        );
    }

    #[test]
    fn test_control_file_is_keyed_by_pid() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/burrow"));
        assert_eq!(
            config.control_file("42", 7),
            PathBuf::from("/tmp/burrow/tmp/42/control-7")
        );
    }

    #[test]
    fn test_archive_paths() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/burrow"));
        assert_eq!(
            config.archive_image("42"),
            PathBuf::from("/tmp/burrow/archive/images/42.img")
        );
        assert_eq!(
            config.archive_meta("42"),
            PathBuf::from("/tmp/burrow/archive/meta/42.json")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_structure() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::with_root(temp.path().join("data"));

        config.ensure_dirs().unwrap();

        assert!(config.links_dir().exists());
        assert!(config.tmp_dir().exists());
        assert!(config.logs_dir().exists());
    }

    #[test]
    fn test_ensure_archive_dirs() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::with_root(temp.path().join("data"));

        config.ensure_archive_dirs().unwrap();

        assert!(config.archive_images_dir().exists());
        assert!(config.archive_meta_dir().exists());
    }
}
