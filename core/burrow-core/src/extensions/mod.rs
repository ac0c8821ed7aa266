//! Optional extensions wired in through the hook registry.
//!
//! An extension declares a name, probes for whatever external pieces it
//! needs, and registers its hooks. Unavailable extensions are skipped with a
//! single warning at install time; nothing later in the session lifecycle
//! has to care.

mod buildenv;
mod editor;

pub use buildenv::Toolchain;
pub use editor::EditorDaemon;

use tracing::{info, warn};

use crate::config::BurrowConfig;
use crate::error::Result;
use crate::hooks::HookRegistry;
use crate::storage::StorageConfig;

pub trait Extension {
    fn name(&self) -> &'static str;

    /// Probe for external dependencies. Called once at install time.
    fn available(&self) -> bool;

    /// Register hooks on the shared registry.
    fn register(&self, hooks: &mut HookRegistry) -> Result<()>;
}

/// Installs the configured extensions, returning the names that registered.
pub fn install(
    storage: &StorageConfig,
    config: &BurrowConfig,
    hooks: &mut HookRegistry,
) -> Vec<&'static str> {
    let mut extensions: Vec<Box<dyn Extension>> = Vec::new();
    if config.extensions.editor_daemon {
        extensions.push(Box::new(EditorDaemon::new(storage, config)));
    }
    if config.extensions.toolchain {
        extensions.push(Box::new(Toolchain::new()));
    }

    let mut installed = Vec::new();
    for extension in extensions {
        if !extension.available() {
            warn!(extension = extension.name(), "extension unavailable; disabled");
            continue;
        }
        match extension.register(hooks) {
            Ok(()) => {
                info!(extension = extension.name(), "extension installed");
                installed.push(extension.name());
            }
            Err(err) => {
                warn!(extension = extension.name(), error = %err, "extension failed to register");
            }
        }
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookEvent;
    use tempfile::tempdir;

    #[test]
    fn default_config_installs_toolchain_only() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("data"));
        let config = BurrowConfig::default();
        let mut hooks = HookRegistry::new();

        let installed = install(&storage, &config, &mut hooks);

        assert_eq!(installed, vec!["toolchain"]);
        assert_eq!(hooks.names(HookEvent::Enter), vec!["toolchain"]);
        assert!(hooks.names(HookEvent::Exit).is_empty());
    }

    #[test]
    fn editor_daemon_with_bogus_command_is_skipped() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("data"));
        let mut config = BurrowConfig::default();
        config.extensions.editor_daemon = true;
        config.extensions.editor_daemon_start = "no-such-editor-xyz --daemon={id}".to_string();
        let mut hooks = HookRegistry::new();

        let installed = install(&storage, &config, &mut hooks);

        assert_eq!(installed, vec!["toolchain"]);
    }
}
