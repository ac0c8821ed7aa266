//! User configuration loading.
//!
//! `~/.burrow/config.toml` is optional; a missing or empty file yields
//! defaults. A malformed file is an error rather than a silent fallback so
//! typos don't masquerade as defaults.

use serde::Deserialize;

use crate::error::{BurrowError, Result};
use crate::storage::StorageConfig;

/// User preferences read from config.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BurrowConfig {
    /// Shell spawned for workspace sessions. Defaults to $SHELL, then /bin/bash.
    pub shell: Option<String>,

    /// Editor used by `configure`. Defaults to $EDITOR, then vi.
    pub editor: Option<String>,

    pub archive: ArchiveConfig,

    pub extensions: ExtensionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Compression backend passed to mksquashfs -comp.
    pub compression: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression: "zstd".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionsConfig {
    /// Enable the per-workspace editor daemon extension.
    pub editor_daemon: bool,

    /// Command used to start the editor server. `{id}` expands to the
    /// workspace identifier.
    pub editor_daemon_start: String,

    /// Command used to stop the editor server.
    pub editor_daemon_stop: String,

    /// Enable the toolchain selection extension.
    pub toolchain: bool,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            editor_daemon: false,
            editor_daemon_start: "emacs --daemon=burrow-{id}".to_string(),
            editor_daemon_stop: "emacsclient -s burrow-{id} -e (kill-emacs)".to_string(),
            toolchain: true,
        }
    }
}

impl BurrowConfig {
    /// Loads the configuration, returning defaults if the file doesn't exist.
    pub fn load(storage: &StorageConfig) -> Result<Self> {
        let path = storage.config_file();
        let contents = match fs_err::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(BurrowError::io("reading config.toml", err)),
        };

        toml::from_str(&contents).map_err(|err| BurrowError::ConfigMalformed {
            path,
            details: err.to_string(),
        })
    }

    /// Resolves the shell to spawn for sessions.
    pub fn resolve_shell(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/bash".to_string())
    }

    /// Resolves the editor command for `configure`.
    pub fn resolve_editor(&self) -> String {
        self.editor
            .clone()
            .or_else(|| std::env::var("EDITOR").ok())
            .unwrap_or_else(|| "vi".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let config = BurrowConfig::load(&storage).unwrap();
        assert!(config.shell.is_none());
        assert_eq!(config.archive.compression, "zstd");
        assert!(!config.extensions.editor_daemon);
    }

    #[test]
    fn parses_partial_config() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        fs_err::write(
            storage.config_file(),
            "shell = \"/bin/zsh\"\n\n[archive]\ncompression = \"gzip\"\n",
        )
        .unwrap();

        let config = BurrowConfig::load(&storage).unwrap();
        assert_eq!(config.shell.as_deref(), Some("/bin/zsh"));
        assert_eq!(config.archive.compression, "gzip");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        fs_err::write(storage.config_file(), "shell = [not toml").unwrap();

        let err = BurrowConfig::load(&storage).unwrap_err();
        assert!(matches!(err, BurrowError::ConfigMalformed { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        fs_err::write(storage.config_file(), "shelll = \"/bin/zsh\"\n").unwrap();

        assert!(BurrowConfig::load(&storage).is_err());
    }
}
