//! The session controller: entering and leaving workspace sessions.
//!
//! `push` spawns a dedicated interactive shell for the workspace and blocks
//! until it exits, then cleans up. Commands issued from *inside* a session
//! (`unload`, `reload`, `switch`) never tear the session down themselves:
//! they write an action into the push's control file and signal the root
//! shell to exit, so the blocked parent wakes up, performs cleanup, and acts
//! on what it finds in the control file. Only the root shell may issue such
//! commands; nested sub-shells fail the parent-pid check.
//!
//! Order matters on entry: validation happens before any file is created, so
//! a failed push leaves no residue.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::BurrowConfig;
use crate::context::{SessionContext, ENV_CONTEXT, ENV_ID, ENV_TMPDIR, ENV_WORKSPACE};
use crate::error::{BurrowError, Result};
use crate::hooks::{HookRegistry, SessionSetup};
use crate::registry;
use crate::sessions::SessionTracker;
use crate::storage::StorageConfig;
use crate::workspace::Workspace;

/// Action a session-internal command leaves for the blocked parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlAction {
    Unload,
    Reload,
    Switch { target: String },
}

/// Outcome of a `switch` request, for the CLI to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// No session was active; the target workspace was entered directly.
    Entered,
    /// Already inside the target workspace; no respawn, the caller should
    /// just change directory to the returned path.
    SameWorkspace(PathBuf),
    /// The running root shell was told to unwind and re-enter the target.
    Signaled,
}

pub struct SessionController<'a> {
    storage: &'a StorageConfig,
    config: &'a BurrowConfig,
    hooks: &'a HookRegistry,
}

impl<'a> SessionController<'a> {
    pub fn new(
        storage: &'a StorageConfig,
        config: &'a BurrowConfig,
        hooks: &'a HookRegistry,
    ) -> Self {
        Self {
            storage,
            config,
            hooks,
        }
    }

    /// Enters a workspace and blocks until its session tree unwinds,
    /// honoring reload/switch actions left in the control file.
    ///
    /// Loading is strictly non-stacking: pushing from inside an active
    /// session is an error pointing at `switch`.
    pub fn push(&self, path: &Path) -> Result<()> {
        if std::env::var_os(ENV_ID).is_some() {
            return Err(BurrowError::AlreadyInSession);
        }

        let mut target = path.to_path_buf();
        loop {
            let workspace = Workspace::load(self.storage, &target)?;
            match self.push_once(&workspace)? {
                None | Some(ControlAction::Unload) => return Ok(()),
                Some(ControlAction::Reload) => {
                    info!(id = %workspace.id(), "reloading workspace");
                }
                Some(ControlAction::Switch { target: id }) => {
                    info!(from = %workspace.id(), to = %id, "switching workspace");
                    target = registry::resolve(self.storage, &id)?;
                }
            }
        }
    }

    /// One spawn/wait/cleanup cycle. Returns the control action the session
    /// left behind, if any.
    fn push_once(&self, workspace: &Workspace) -> Result<Option<ControlAction>> {
        let id = workspace.id();
        let pusher_pid = std::process::id();

        self.storage
            .ensure_workspace_tmp(id)
            .map_err(|err| BurrowError::io("creating workspace tmp dir", err))?;

        let control_file = self.storage.control_file(id, pusher_pid);
        fs_err::write(&control_file, b"")
            .map_err(|err| BurrowError::io("creating control file", err))?;

        let mut setup = SessionSetup::default();
        self.hooks.run_enter(workspace, &mut setup);

        let rc_file = self.storage.session_rc_file(id, pusher_pid);
        fs_err::write(&rc_file, render_rc(workspace, &setup))
            .map_err(|err| BurrowError::io("writing session rc file", err))?;

        let context_file = self.storage.session_context_file(id, pusher_pid);
        let tmp_dir = self.storage.workspace_tmp_dir(id);

        let shell = self.config.resolve_shell();
        let mut command = shell_invocation(&shell, &rc_file);
        command
            .current_dir(workspace.path())
            .env(ENV_WORKSPACE, workspace.path())
            .env(ENV_ID, id)
            .env(ENV_TMPDIR, &tmp_dir)
            .env(ENV_CONTEXT, &context_file);
        for (key, value) in &setup.env {
            command.env(key, value);
        }

        // The shell reads BURROW_CONTEXT in its first instants, so the file
        // must exist before spawn; the root pid is filled in right after.
        let mut context = SessionContext {
            workspace: workspace.path().to_path_buf(),
            id: id.to_string(),
            tmp_dir: tmp_dir.clone(),
            root_pid: 0,
            pusher_pid,
            control_file: control_file.clone(),
            entered_at: chrono::Utc::now(),
        };
        context.save(self.storage)?;

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                let _ = fs_err::remove_file(&control_file);
                let _ = fs_err::remove_file(&rc_file);
                let _ = context.remove(self.storage);
                return Err(BurrowError::CommandFailed {
                    command: shell,
                    details: err.to_string(),
                });
            }
        };
        let root_pid = child.id();

        let tracker = SessionTracker::new(self.storage, id);
        tracker.record(root_pid)?;

        context.root_pid = root_pid;
        context.save(self.storage)?;
        info!(id = %id, root_pid, "session started");

        let status = child
            .wait()
            .map_err(|err| BurrowError::io("waiting for session shell", err))?;
        info!(id = %id, root_pid, code = ?status.code(), "session shell exited");

        // Cleanup mirrors entry in reverse: reconcile, context, exit script,
        // exit hooks, then scratch teardown once nothing remains.
        let survivors = tracker.reconcile()?;
        context.remove(self.storage)?;
        self.run_exit_script(workspace);
        self.hooks.run_exit(&context, survivors.len());

        let action = read_control(&control_file);
        let _ = fs_err::remove_file(&control_file);
        let _ = fs_err::remove_file(&rc_file);

        if survivors.is_empty() {
            if let Err(err) = fs_err::remove_dir_all(&tmp_dir) {
                warn!(id = %id, error = %err, "failed to remove workspace tmp dir");
            }
        }

        Ok(action)
    }

    /// Unwinds the current session. Root shell only.
    pub fn unload(&self) -> Result<()> {
        let context = self.root_context()?;
        write_control(&context.control_file, &ControlAction::Unload)?;
        signal_root(context.root_pid)
    }

    /// Unwinds and immediately re-enters the current workspace. Root shell
    /// only.
    pub fn reload(&self) -> Result<()> {
        let context = self.root_context()?;
        write_control(&context.control_file, &ControlAction::Reload)?;
        signal_root(context.root_pid)
    }

    /// Switches to another workspace.
    pub fn switch(&self, target: &Workspace) -> Result<SwitchOutcome> {
        let context = match SessionContext::current() {
            Ok(context) => context,
            Err(BurrowError::NotInSession) => {
                self.push(target.path())?;
                return Ok(SwitchOutcome::Entered);
            }
            Err(err) => return Err(err),
        };

        if context.id == target.id() {
            return Ok(SwitchOutcome::SameWorkspace(context.workspace));
        }

        if !context.invoked_from_root_shell() {
            return Err(BurrowError::NotRootSession {
                root_pid: context.root_pid,
            });
        }

        write_control(
            &context.control_file,
            &ControlAction::Switch {
                target: target.id().to_string(),
            },
        )?;
        signal_root(context.root_pid)?;
        Ok(SwitchOutcome::Signaled)
    }

    /// The one thing a nested sub-shell may do: locate the on-enter script
    /// so the caller can re-source it.
    pub fn rehash(&self) -> Result<PathBuf> {
        let context = SessionContext::current()?;
        let workspace = Workspace::load(self.storage, &context.workspace)?;
        Ok(workspace.enter_script())
    }

    fn root_context(&self) -> Result<SessionContext> {
        let context = SessionContext::current()?;
        if !context.invoked_from_root_shell() {
            return Err(BurrowError::NotRootSession {
                root_pid: context.root_pid,
            });
        }
        Ok(context)
    }

    fn run_exit_script(&self, workspace: &Workspace) {
        let script = workspace.exit_script();
        if !script.exists() {
            return;
        }
        let result = Command::new("/bin/sh")
            .arg(&script)
            .current_dir(workspace.path())
            .env(ENV_WORKSPACE, workspace.path())
            .env(ENV_ID, workspace.id())
            .status();
        match result {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(id = %workspace.id(), code = ?status.code(), "exit script failed"),
            Err(err) => warn!(id = %workspace.id(), error = %err, "could not run exit script"),
        }
    }
}

/// Builds the shell command for a session. Bash takes the generated startup
/// file via `--rcfile`; POSIX-ish shells pick it up through `$ENV`.
fn shell_invocation(shell: &str, rc_file: &Path) -> Command {
    let is_bash = Path::new(shell)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains("bash"));

    let mut command = Command::new(shell);
    if is_bash {
        command.arg("--rcfile").arg(rc_file).arg("-i");
    } else {
        command.env("ENV", rc_file);
    }
    command
}

fn render_rc(workspace: &Workspace, setup: &SessionSetup) -> String {
    let mut rc = String::new();
    rc.push_str("# generated by burrow; regenerated on every push\n");
    rc.push_str("[ -f \"$HOME/.bashrc\" ] && . \"$HOME/.bashrc\"\n");
    rc.push_str(&format!(
        "cd '{}' || return\n",
        workspace.path().display()
    ));
    rc.push_str(&format!(
        "export HISTFILE='{}'\n",
        workspace.history_file().display()
    ));
    for line in &setup.rc_lines {
        rc.push_str(line);
        rc.push('\n');
    }
    rc.push_str(&format!(
        "[ -f '{0}' ] && . '{0}'\n",
        workspace.enter_script().display()
    ));
    rc
}

fn write_control(path: &Path, action: &ControlAction) -> Result<()> {
    let contents = serde_json::to_string(action)
        .map_err(|err| BurrowError::json("serializing control action", err))?;
    fs_err::write(path, contents).map_err(|err| BurrowError::io("writing control file", err))
}

/// Reads the action a session left in its control file. An empty or
/// malformed file means "no action".
fn read_control(path: &Path) -> Option<ControlAction> {
    let contents = fs_err::read_to_string(path).ok()?;
    if contents.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&contents) {
        Ok(action) => Some(action),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring malformed control file");
            None
        }
    }
}

#[cfg(unix)]
fn signal_root(root_pid: u32) -> Result<()> {
    let rc = unsafe { libc::kill(root_pid as i32, libc::SIGHUP) };
    if rc != 0 {
        return Err(BurrowError::io(
            format!("signaling root shell {root_pid}"),
            std::io::Error::last_os_error(),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn signal_root(_root_pid: u32) -> Result<()> {
    Err(BurrowError::MissingDependency(
        "session signaling is only supported on unix".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionContext;
    use tempfile::tempdir;

    fn harness(shell: &str) -> (tempfile::TempDir, StorageConfig, BurrowConfig, HookRegistry) {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("data"));
        storage.ensure_dirs().unwrap();
        let config = BurrowConfig {
            shell: Some(shell.to_string()),
            ..BurrowConfig::default()
        };
        (temp, storage, config, HookRegistry::new())
    }

    fn make_workspace(temp: &tempfile::TempDir, storage: &StorageConfig) -> Workspace {
        let path = temp.path().join("proj");
        fs_err::create_dir_all(&path).unwrap();
        Workspace::init(storage, &path).unwrap()
    }

    #[test]
    fn push_invalid_path_leaves_no_residue() {
        let (temp, storage, config, hooks) = harness("/bin/sh");
        let controller = SessionController::new(&storage, &config, &hooks);

        let bare = temp.path().join("bare");
        fs_err::create_dir_all(&bare).unwrap();

        let err = controller.push(&bare).unwrap_err();
        assert!(matches!(err, BurrowError::NotAWorkspace { .. }));
        // tmp/ holds no per-workspace residue
        assert_eq!(fs_err::read_dir(storage.tmp_dir()).unwrap().count(), 0);
    }

    #[test]
    fn push_runs_session_and_cleans_up() {
        // /bin/true exits immediately, standing in for a shell the user
        // closed right away.
        let (temp, storage, config, hooks) = harness("/bin/true");
        let controller = SessionController::new(&storage, &config, &hooks);
        let workspace = make_workspace(&temp, &storage);

        controller.push(workspace.path()).unwrap();

        let tracker = SessionTracker::new(&storage, workspace.id());
        assert_eq!(tracker.count().unwrap(), 0);
        // Last session out removes the scratch directory.
        assert!(!storage.workspace_tmp_dir(workspace.id()).exists());
    }

    #[test]
    fn context_file_exists_when_the_shell_starts() {
        use std::os::unix::fs::PermissionsExt;

        let (temp, storage, _config, hooks) = harness("/bin/true");
        let workspace = make_workspace(&temp, &storage);

        // A "shell" that records whether the context file was readable the
        // moment it came up.
        let witness = temp.path().join("seen-context");
        let shell = temp.path().join("shell.sh");
        fs_err::write(
            &shell,
            format!(
                "#!/bin/sh\n[ -f \"$BURROW_CONTEXT\" ] && touch '{}'\n",
                witness.display()
            ),
        )
        .unwrap();
        let mut perms = fs_err::metadata(&shell).unwrap().permissions();
        perms.set_mode(0o755);
        fs_err::set_permissions(&shell, perms).unwrap();

        let config = BurrowConfig {
            shell: Some(shell.to_string_lossy().into_owned()),
            ..BurrowConfig::default()
        };
        let controller = SessionController::new(&storage, &config, &hooks);
        controller.push(workspace.path()).unwrap();

        assert!(witness.exists());
    }

    #[test]
    fn exit_script_runs_on_the_way_out() {
        let (temp, storage, config, hooks) = harness("/bin/true");
        let controller = SessionController::new(&storage, &config, &hooks);
        let workspace = make_workspace(&temp, &storage);

        let witness = temp.path().join("exited");
        fs_err::write(
            workspace.exit_script(),
            format!("#!/bin/sh\ntouch '{}'\n", witness.display()),
        )
        .unwrap();

        controller.push(workspace.path()).unwrap();
        assert!(witness.exists());
    }

    #[test]
    fn exit_hooks_see_zero_remaining_for_last_session() {
        let (temp, storage, config, mut hooks) = harness("/bin/true");
        let workspace = make_workspace(&temp, &storage);

        let witness = temp.path().join("hook-remaining");
        let witness_clone = witness.clone();
        hooks
            .register_exit("witness", move |_, remaining| {
                fs_err::write(&witness_clone, remaining.to_string())
                    .map_err(|err| BurrowError::io("witness", err))
            })
            .unwrap();

        let controller = SessionController::new(&storage, &config, &hooks);
        controller.push(workspace.path()).unwrap();

        assert_eq!(fs_err::read_to_string(&witness).unwrap(), "0");
    }

    #[test]
    fn enter_hook_rc_lines_land_in_rc_file() {
        let workspace_dir = tempdir().unwrap();
        let storage = StorageConfig::with_root(workspace_dir.path().join("data"));
        storage.ensure_dirs().unwrap();
        let path = workspace_dir.path().join("proj");
        fs_err::create_dir_all(&path).unwrap();
        let workspace = Workspace::init(&storage, &path).unwrap();

        let mut setup = SessionSetup::default();
        setup.rc_lines.push("source /opt/ros/setup.sh".to_string());
        let rc = render_rc(&workspace, &setup);

        assert!(rc.contains("source /opt/ros/setup.sh"));
        assert!(rc.contains("HISTFILE"));
        let enter = format!("{}", workspace.enter_script().display());
        assert!(rc.contains(&enter));
    }

    #[test]
    fn control_roundtrip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("control");

        write_control(&path, &ControlAction::Reload).unwrap();
        assert_eq!(read_control(&path), Some(ControlAction::Reload));

        write_control(
            &path,
            &ControlAction::Switch {
                target: "1234567890".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            read_control(&path),
            Some(ControlAction::Switch {
                target: "1234567890".to_string()
            })
        );
    }

    #[test]
    fn empty_or_garbage_control_means_no_action() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("control");

        fs_err::write(&path, b"").unwrap();
        assert_eq!(read_control(&path), None);

        fs_err::write(&path, b"{half a record").unwrap();
        assert_eq!(read_control(&path), None);
    }

    #[test]
    fn unload_outside_session_is_not_in_session() {
        // Tests run without BURROW_CONTEXT in the environment.
        let (_temp, storage, config, hooks) = harness("/bin/true");
        let controller = SessionController::new(&storage, &config, &hooks);
        assert!(matches!(
            controller.unload().unwrap_err(),
            BurrowError::NotInSession
        ));
    }

    #[test]
    fn nested_subshell_context_fails_root_check() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("data"));
        storage.ensure_workspace_tmp("1234567890").unwrap();

        // A context whose root pid is not our parent: the nested case.
        let context = SessionContext {
            workspace: temp.path().to_path_buf(),
            id: "1234567890".to_string(),
            tmp_dir: storage.workspace_tmp_dir("1234567890"),
            root_pid: 1,
            pusher_pid: std::process::id(),
            control_file: storage.control_file("1234567890", std::process::id()),
            entered_at: chrono::Utc::now(),
        };
        assert!(!context.invoked_from_root_shell());
    }

    #[test]
    fn bash_invocation_uses_rcfile() {
        let command = shell_invocation("/bin/bash", Path::new("/tmp/rc"));
        let args: Vec<_> = command.get_args().map(|a| a.to_os_string()).collect();
        assert_eq!(args[0], "--rcfile");
    }

    #[test]
    fn posix_invocation_uses_env_var() {
        let command = shell_invocation("/bin/sh", Path::new("/tmp/rc"));
        assert_eq!(command.get_args().count(), 0);
        let has_env = command
            .get_envs()
            .any(|(k, v)| k == "ENV" && v == Some(std::ffi::OsStr::new("/tmp/rc")));
        assert!(has_env);
    }
}
