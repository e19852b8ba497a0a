// src/exec/signal.rs

//! Graceful stop with escalation.

use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Exit code reported when the exit status carries none (killed by signal).
pub const SIGNALED_EXIT_CODE: i32 = -1;

const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(2);

/// Send SIGTERM to the process group, wait up to `grace`, then SIGKILL.
///
/// Returns the exit code observed, or [`SIGNALED_EXIT_CODE`].
pub async fn stop_child(child: &mut Child, grace: Duration) -> i32 {
    let Some(pid) = child.id() else {
        // Already reaped.
        return match child.try_wait() {
            Ok(Some(status)) => status.code().unwrap_or(SIGNALED_EXIT_CODE),
            _ => SIGNALED_EXIT_CODE,
        };
    };

    send_terminate(pid);
    let grace = if cfg!(unix) { grace } else { Duration::ZERO };

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(pid, "process stopped gracefully");
            return status.code().unwrap_or(SIGNALED_EXIT_CODE);
        }
        Ok(Err(e)) => {
            warn!(pid, error = %e, "waiting for process after SIGTERM failed");
        }
        Err(_) => {
            warn!(pid, grace = ?grace, "graceful stop timed out; force killing");
        }
    }

    force_kill(pid);
    if let Err(e) = child.start_kill() {
        debug!(pid, error = %e, "start_kill after force kill");
    }
    match timeout(FORCE_KILL_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => status.code().unwrap_or(SIGNALED_EXIT_CODE),
        Ok(Err(e)) => {
            warn!(pid, error = %e, "waiting for process after kill failed");
            SIGNALED_EXIT_CODE
        }
        Err(_) => {
            warn!(pid, "process did not exit after force kill");
            SIGNALED_EXIT_CODE
        }
    }
}

#[cfg(unix)]
fn send_terminate(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!(pid, error = %e, "failed to send SIGTERM");
    }
}

#[cfg(unix)]
fn force_kill(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, error = %e, "failed to send SIGKILL to process group");
    }
}

// No SIGTERM off unix; `stop_child` goes straight to `Child::start_kill`.
#[cfg(not(unix))]
fn send_terminate(_pid: u32) {}

#[cfg(not(unix))]
fn force_kill(_pid: u32) {}
