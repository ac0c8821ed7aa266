//! External command discovery and invocation.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{BurrowError, Result};

/// Searches PATH for an executable, returning its full path.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Runs a command to completion, mapping a non-zero exit or spawn failure to
/// `CommandFailed` with the captured stderr.
pub fn run(program: &Path, args: &[&str]) -> Result<()> {
    let rendered = format!("{} {}", program.display(), args.join(" "));
    debug!(command = %rendered, "running external command");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| BurrowError::CommandFailed {
            command: rendered.clone(),
            details: err.to_string(),
        })?;

    if !output.status.success() {
        return Err(BurrowError::CommandFailed {
            command: rendered,
            details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_sh_on_path() {
        assert!(find_in_path("sh").is_some());
    }

    #[test]
    fn missing_tool_is_none() {
        assert!(find_in_path("definitely-not-a-real-tool-xyz").is_none());
    }

    #[test]
    fn failing_command_reports_stderr() {
        let sh = find_in_path("sh").unwrap();
        let err = run(&sh, &["-c", "echo boom >&2; exit 3"]).unwrap_err();
        match err {
            BurrowError::CommandFailed { details, .. } => assert!(details.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn successful_command_is_ok() {
        let sh = find_in_path("sh").unwrap();
        run(&sh, &["-c", "true"]).unwrap();
    }
}
