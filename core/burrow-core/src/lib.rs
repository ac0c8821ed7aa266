//! # burrow-core
//!
//! Core library for burrow: workspace registration, session lifecycle, and
//! archiving of inactive workspaces.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Sessions are independent
//!   OS processes, not tasks.
//! - **Explicit context**: Session state lives in a persisted
//!   `SessionContext` record, not in scattered inherited environment.
//! - **Validate first**: Operations check their preconditions up front and
//!   return without side effects on failure; a failed operation never leaves
//!   partial registry state behind.

pub mod archive;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod extensions;
pub mod hooks;
pub mod identity;
pub mod process;
pub mod registry;
pub mod sessions;
pub mod storage;
pub mod tools;
pub mod workspace;

pub use archive::{ArchiveManager, ArchiveRecord, ArchiveTools};
pub use config::BurrowConfig;
pub use context::SessionContext;
pub use controller::{ControlAction, SessionController, SwitchOutcome};
pub use error::{BurrowError, Result};
pub use hooks::{HookEvent, HookRegistry, SessionSetup};
pub use sessions::{SessionRecord, SessionTracker};
pub use storage::StorageConfig;
pub use workspace::Workspace;
