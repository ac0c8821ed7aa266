//! Process inspection helpers.
//!
//! Operating systems reuse PIDs, so a bare liveness check can confuse a dead
//! session with an unrelated process that inherited its PID. Session records
//! therefore carry the process start time captured at record time; a PID only
//! counts as live if the start time still matches (±2s tolerance for clock
//! rounding between sources).

use sysinfo::{Pid, ProcessRefreshKind, System};

pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Get the start time of a process (Unix timestamp, seconds).
/// Returns None if the process doesn't exist or can't be queried.
pub fn get_process_start_time(pid: u32) -> Option<u64> {
    let mut sys = System::new();
    let sys_pid = Pid::from(pid as usize);
    sys.refresh_process_specifics(sys_pid, ProcessRefreshKind::new());
    sys.process(sys_pid).map(|process| process.start_time())
}

/// Verify that a PID is alive AND matches the expected start time.
/// Records without a start time (written on platforms where sysinfo could
/// not resolve one) fall back to the bare liveness check.
pub fn is_pid_alive_verified(pid: u32, expected_start: Option<u64>) -> bool {
    let Some(expected) = expected_start else {
        return is_pid_alive(pid);
    };

    match get_process_start_time(pid) {
        Some(actual) => actual.abs_diff(expected) <= 2,
        None => false,
    }
}

/// Parent process id of the calling process.
pub fn parent_pid() -> u32 {
    #[cfg(unix)]
    {
        unsafe { libc::getppid() as u32 }
    }
    #[cfg(not(unix))]
    {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_pid_is_alive() {
        assert!(is_pid_alive(std::process::id()));
    }

    #[test]
    fn absurd_pid_is_dead() {
        assert!(!is_pid_alive(99_999_999));
    }

    #[test]
    fn own_start_time_verifies() {
        let pid = std::process::id();
        let started = get_process_start_time(pid).expect("own process start time");
        assert!(is_pid_alive_verified(pid, Some(started)));
    }

    #[test]
    fn mismatched_start_time_fails_verification() {
        let pid = std::process::id();
        assert!(!is_pid_alive_verified(pid, Some(1)));
    }
}
