//! Error types for burrow-core operations.

use std::path::PathBuf;

/// All errors that can occur in burrow-core operations.
#[derive(Debug, thiserror::Error)]
pub enum BurrowError {
    // ─────────────────────────────────────────────────────────────────────
    // Workspace Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Not a workspace: {path}: {reason}")]
    NotAWorkspace { path: PathBuf, reason: String },

    #[error("Already a workspace: {0}")]
    AlreadyAWorkspace(PathBuf),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    // ─────────────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Not inside a workspace session")]
    NotInSession,

    #[error("Operation requires the root session shell (pid {root_pid}); nested sub-shells may not unload, switch, or reload")]
    NotRootSession { root_pid: u32 },

    #[error("Workspace {id} has {count} active session(s)")]
    SessionsActive { id: String, count: usize },

    #[error("A session is already active; use switch instead of enter")]
    AlreadyInSession,

    // ─────────────────────────────────────────────────────────────────────
    // Archive Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Workspace {0} is live; cannot mount or restore over an existing registry link")]
    AlreadyLive(String),

    #[error("No archive exists for identifier {0}")]
    NotArchived(String),

    #[error("Workspace {0} is mounted read-only; unmount it before archiving")]
    Mounted(String),

    // ─────────────────────────────────────────────────────────────────────
    // Environment Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Missing external dependency: {0}")]
    MissingDependency(String),

    #[error("Hook registration rejected: {name}: {reason}")]
    HookRegistration { name: String, reason: String },

    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl BurrowError {
    /// Wraps an io::Error with a human-readable context string.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BurrowError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        BurrowError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using BurrowError.
pub type Result<T> = std::result::Result<T, BurrowError>;
