//! Build-environment selection.
//!
//! A workspace can name a toolchain setup script in `.burrow/toolchain`
//! (absolute, or relative to the workspace root). The enter hook injects a
//! `source` line for it into the session rc file and exports
//! `BURROW_TOOLCHAIN` so prompts and scripts can show which environment is
//! active. Workspaces without the selector file are untouched.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{BurrowError, Result};
use crate::extensions::Extension;
use crate::hooks::HookRegistry;

pub const TOOLCHAIN_ENV: &str = "BURROW_TOOLCHAIN";

#[derive(Default)]
pub struct Toolchain;

impl Toolchain {
    pub fn new() -> Self {
        Self
    }
}

impl Extension for Toolchain {
    fn name(&self) -> &'static str {
        "toolchain"
    }

    fn available(&self) -> bool {
        // Pure file plumbing; nothing external to probe.
        true
    }

    fn register(&self, hooks: &mut HookRegistry) -> Result<()> {
        hooks.register_enter("toolchain", |workspace, setup| {
            let selector = workspace.toolchain_file();
            let contents = match fs_err::read_to_string(&selector) {
                Ok(contents) => contents,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(err) => return Err(BurrowError::io("reading toolchain selector", err)),
            };

            let named = contents.trim();
            if named.is_empty() {
                return Ok(());
            }

            let script = if PathBuf::from(named).is_absolute() {
                PathBuf::from(named)
            } else {
                workspace.path().join(named)
            };
            if !script.is_file() {
                return Err(BurrowError::MissingDependency(format!(
                    "toolchain script {}",
                    script.display()
                )));
            }

            debug!(id = %workspace.id(), script = %script.display(), "toolchain selected");
            setup
                .env
                .push((TOOLCHAIN_ENV.to_string(), script.to_string_lossy().into_owned()));
            setup.rc_lines.push(format!(". '{}'", script.display()));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::SessionSetup;
    use crate::storage::StorageConfig;
    use crate::workspace::Workspace;
    use tempfile::tempdir;

    fn workspace() -> (tempfile::TempDir, Workspace, HookRegistry) {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("data"));
        storage.ensure_dirs().unwrap();
        let path = temp.path().join("proj");
        fs_err::create_dir_all(&path).unwrap();
        let ws = Workspace::init(&storage, &path).unwrap();

        let mut hooks = HookRegistry::new();
        Toolchain::new().register(&mut hooks).unwrap();
        (temp, ws, hooks)
    }

    #[test]
    fn no_selector_means_no_changes() {
        let (_temp, ws, hooks) = workspace();
        let mut setup = SessionSetup::default();
        hooks.run_enter(&ws, &mut setup);
        assert!(setup.env.is_empty());
        assert!(setup.rc_lines.is_empty());
    }

    #[test]
    fn relative_selector_resolves_against_workspace() {
        let (_temp, ws, hooks) = workspace();
        fs_err::write(ws.path().join("env.sh"), "export ROS_DISTRO=jazzy\n").unwrap();
        fs_err::write(ws.toolchain_file(), "env.sh\n").unwrap();

        let mut setup = SessionSetup::default();
        hooks.run_enter(&ws, &mut setup);

        assert_eq!(setup.env.len(), 1);
        assert_eq!(setup.env[0].0, TOOLCHAIN_ENV);
        assert!(setup.rc_lines[0].contains("env.sh"));
    }

    #[test]
    fn missing_script_contributes_nothing() {
        let (_temp, ws, hooks) = workspace();
        fs_err::write(ws.toolchain_file(), "does-not-exist.sh\n").unwrap();

        // The hook errors; the runner reports and continues with no changes.
        let mut setup = SessionSetup::default();
        hooks.run_enter(&ws, &mut setup);
        assert!(setup.env.is_empty());
        assert!(setup.rc_lines.is_empty());
    }
}
