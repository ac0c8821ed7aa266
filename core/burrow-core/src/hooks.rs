//! Typed lifecycle hook registry.
//!
//! Extensions register named callbacks against a lifecycle event; callbacks
//! run in registration order. The registry is append-only for the lifetime
//! of the process and validates names at registration time, so there is no
//! call-time name lookup that could silently miss.
//!
//! Enter hooks run before the session shell spawns and may contribute
//! environment variables and rc-file lines to the pending session. Exit
//! hooks run after the shell exits and see the reconciled count of sessions
//! that remain, so the last one out can tear down shared per-workspace
//! resources.

use crate::context::SessionContext;
use crate::error::{BurrowError, Result};
use crate::workspace::Workspace;
use tracing::{debug, warn};

/// Lifecycle points hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Enter,
    Exit,
}

/// Mutable session parameters that enter hooks may extend.
#[derive(Debug, Default)]
pub struct SessionSetup {
    /// Extra environment exported into the session shell.
    pub env: Vec<(String, String)>,
    /// Extra lines appended to the generated shell startup file.
    pub rc_lines: Vec<String>,
}

type EnterHook = Box<dyn Fn(&Workspace, &mut SessionSetup) -> Result<()>>;
type ExitHook = Box<dyn Fn(&SessionContext, usize) -> Result<()>>;

/// Ordered, append-only registry of lifecycle hooks.
#[derive(Default)]
pub struct HookRegistry {
    enter: Vec<(String, EnterHook)>,
    exit: Vec<(String, ExitHook)>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_enter(
        &mut self,
        name: &str,
        hook: impl Fn(&Workspace, &mut SessionSetup) -> Result<()> + 'static,
    ) -> Result<()> {
        self.validate_name(name, HookEvent::Enter)?;
        self.enter.push((name.to_string(), Box::new(hook)));
        Ok(())
    }

    pub fn register_exit(
        &mut self,
        name: &str,
        hook: impl Fn(&SessionContext, usize) -> Result<()> + 'static,
    ) -> Result<()> {
        self.validate_name(name, HookEvent::Exit)?;
        self.exit.push((name.to_string(), Box::new(hook)));
        Ok(())
    }

    /// Registered hook names for an event, in invocation order.
    pub fn names(&self, event: HookEvent) -> Vec<&str> {
        match event {
            HookEvent::Enter => self.enter.iter().map(|(n, _)| n.as_str()).collect(),
            HookEvent::Exit => self.exit.iter().map(|(n, _)| n.as_str()).collect(),
        }
    }

    /// Runs enter hooks in registration order. A failing hook is reported
    /// and skipped; it never aborts session entry.
    pub fn run_enter(&self, workspace: &Workspace, setup: &mut SessionSetup) {
        for (name, hook) in &self.enter {
            debug!(hook = %name, "running enter hook");
            if let Err(err) = hook(workspace, setup) {
                warn!(hook = %name, error = %err, "enter hook failed");
            }
        }
    }

    /// Runs exit hooks in registration order with the number of sessions
    /// that survived reconciliation.
    pub fn run_exit(&self, context: &SessionContext, remaining: usize) {
        for (name, hook) in &self.exit {
            debug!(hook = %name, remaining, "running exit hook");
            if let Err(err) = hook(context, remaining) {
                warn!(hook = %name, error = %err, "exit hook failed");
            }
        }
    }

    fn validate_name(&self, name: &str, event: HookEvent) -> Result<()> {
        if name.trim().is_empty() {
            return Err(BurrowError::HookRegistration {
                name: name.to_string(),
                reason: "hook name is empty".to_string(),
            });
        }
        if self.names(event).contains(&name) {
            return Err(BurrowError::HookRegistration {
                name: name.to_string(),
                reason: "hook already registered for this event".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("data"));
        storage.ensure_dirs().unwrap();
        let path = temp.path().join("proj");
        fs_err::create_dir_all(&path).unwrap();
        let ws = Workspace::init(&storage, &path).unwrap();
        (temp, ws)
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let (_temp, ws) = workspace();
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HookRegistry::new();

        for name in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            registry
                .register_enter(name, move |_, _| {
                    order.borrow_mut().push(name);
                    Ok(())
                })
                .unwrap();
        }

        registry.run_enter(&ws, &mut SessionSetup::default());
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut registry = HookRegistry::new();
        let err = registry.register_enter("  ", |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, BurrowError::HookRegistration { .. }));
    }

    #[test]
    fn duplicate_name_per_event_is_rejected() {
        let mut registry = HookRegistry::new();
        registry.register_enter("editor", |_, _| Ok(())).unwrap();
        assert!(registry.register_enter("editor", |_, _| Ok(())).is_err());
        // Same name on the other event is fine.
        registry.register_exit("editor", |_, _| Ok(())).unwrap();
    }

    #[test]
    fn failing_hook_does_not_stop_the_rest() {
        let (_temp, ws) = workspace();
        let ran = Rc::new(RefCell::new(false));
        let mut registry = HookRegistry::new();

        registry
            .register_enter("bad", |_, _| {
                Err(BurrowError::MissingDependency("nope".to_string()))
            })
            .unwrap();
        let ran_clone = Rc::clone(&ran);
        registry
            .register_enter("good", move |_, _| {
                *ran_clone.borrow_mut() = true;
                Ok(())
            })
            .unwrap();

        registry.run_enter(&ws, &mut SessionSetup::default());
        assert!(*ran.borrow());
    }

    #[test]
    fn enter_hooks_extend_session_setup() {
        let (_temp, ws) = workspace();
        let mut registry = HookRegistry::new();
        registry
            .register_enter("toolchain", |_, setup| {
                setup.env.push(("TOOL".to_string(), "x".to_string()));
                setup.rc_lines.push("source /opt/tool/env.sh".to_string());
                Ok(())
            })
            .unwrap();

        let mut setup = SessionSetup::default();
        registry.run_enter(&ws, &mut setup);
        assert_eq!(setup.env.len(), 1);
        assert_eq!(setup.rc_lines.len(), 1);
    }
}
