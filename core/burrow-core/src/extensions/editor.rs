//! Per-workspace editor daemon.
//!
//! The first session entering a workspace starts an editor server named
//! after the workspace identifier; the last session out shuts it down.
//! Commands are configurable (`extensions.editor_daemon_start` / `_stop`),
//! with `{id}` expanding to the identifier. Defaults target emacs.

use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::config::BurrowConfig;
use crate::error::{BurrowError, Result};
use crate::extensions::Extension;
use crate::hooks::HookRegistry;
use crate::sessions::SessionTracker;
use crate::storage::StorageConfig;
use crate::tools;

pub struct EditorDaemon {
    storage: StorageConfig,
    start: String,
    stop: String,
}

impl EditorDaemon {
    pub fn new(storage: &StorageConfig, config: &BurrowConfig) -> Self {
        Self {
            storage: storage.clone(),
            start: config.extensions.editor_daemon_start.clone(),
            stop: config.extensions.editor_daemon_stop.clone(),
        }
    }
}

impl Extension for EditorDaemon {
    fn name(&self) -> &'static str {
        "editor-daemon"
    }

    fn available(&self) -> bool {
        first_word(&self.start)
            .map(|bin| tools::find_in_path(bin).is_some())
            .unwrap_or(false)
    }

    fn register(&self, hooks: &mut HookRegistry) -> Result<()> {
        let storage = self.storage.clone();
        let start = self.start.clone();
        hooks.register_enter("editor-daemon", move |workspace, _setup| {
            let tracker = SessionTracker::new(&storage, workspace.id());
            if tracker.count()? > 0 {
                debug!(id = %workspace.id(), "editor daemon already serving this workspace");
                return Ok(());
            }
            spawn_detached(&expand(&start, workspace.id()))
        })?;

        let stop = self.stop.clone();
        hooks.register_exit("editor-daemon", move |context, remaining| {
            if remaining > 0 {
                return Ok(());
            }
            run_to_completion(&expand(&stop, &context.id))
        })?;

        Ok(())
    }
}

fn expand(template: &str, id: &str) -> String {
    template.replace("{id}", id)
}

fn first_word(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}

fn parse(command: &str) -> Result<(String, Vec<String>)> {
    let mut words = command.split_whitespace().map(str::to_string);
    let program = words.next().ok_or_else(|| BurrowError::CommandFailed {
        command: command.to_string(),
        details: "empty command".to_string(),
    })?;
    Ok((program, words.collect()))
}

/// Starts the server without waiting for it; it outlives the session
/// controller on purpose.
fn spawn_detached(command: &str) -> Result<()> {
    let (program, args) = parse(command)?;
    debug!(command, "starting editor daemon");
    Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| BurrowError::CommandFailed {
            command: command.to_string(),
            details: err.to_string(),
        })?;
    Ok(())
}

fn run_to_completion(command: &str) -> Result<()> {
    let (program, args) = parse(command)?;
    debug!(command, "stopping editor daemon");
    let status = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|err| BurrowError::CommandFailed {
            command: command.to_string(),
            details: err.to_string(),
        })?;
    if !status.success() {
        warn!(command, code = ?status.code(), "editor daemon stop command failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_identifier_placeholder() {
        assert_eq!(
            expand("emacs --daemon=burrow-{id}", "1234567890"),
            "emacs --daemon=burrow-1234567890"
        );
    }

    #[test]
    fn availability_follows_path_lookup() {
        let temp = tempfile::tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("data"));
        let mut config = BurrowConfig::default();

        config.extensions.editor_daemon_start = "sh -c true".to_string();
        assert!(EditorDaemon::new(&storage, &config).available());

        config.extensions.editor_daemon_start = "no-such-editor-xyz".to_string();
        assert!(!EditorDaemon::new(&storage, &config).available());
    }

    #[test]
    fn parse_splits_program_and_args() {
        let (program, args) = parse("emacsclient -s foo -e (kill-emacs)").unwrap();
        assert_eq!(program, "emacsclient");
        assert_eq!(args, vec!["-s", "foo", "-e", "(kill-emacs)"]);
    }
}
