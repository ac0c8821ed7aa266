//! Tracing setup for the CLI.
//!
//! Diagnostics go to a daily-rolled file under the burrow logs directory,
//! never to the terminal: stderr is reserved for user-facing error lines.
//! `BURROW_LOG` takes an env-filter directive; the default records warnings
//! and errors only.

use burrow_core::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_env("BURROW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    if fs_err::create_dir_all(storage.logs_dir()).is_err() {
        return None;
    }
    let appender = tracing_appender::rolling::daily(storage.logs_dir(), "burrow.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(guard)
}
