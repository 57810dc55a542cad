//! This module implements the monitor loop that races the termination of a child process against
//! its real time limit and its cancellation token.
//!

use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

use std::os::unix::process::ExitStatusExt;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use super::{
    Result,
    CancellationToken,
    ProcessResourceLimits,
    ProcessExitStatus,
};

/// Interval between consecutive `wait` calls in the monitor loop.
const WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// Provide a RAII guard type that owns the process group of a child process.
///
/// The child is started as the leader of a new process group, so the group ID equals the child's
/// pid. If the guard is dropped before it has been disarmed, for example because an error
/// interrupted the monitor loop, every process in the group is killed.
struct ProcessGroupGuard {
    /// ID of the process group.
    pgid: Pid,

    /// Whether the process group should be killed when this instance is dropped.
    armed: bool,
}

impl ProcessGroupGuard {
    /// Create a new `ProcessGroupGuard` instance for the process group led by the given child.
    fn new(child: &Child) -> Self {
        ProcessGroupGuard {
            pgid: Pid::from_raw(child.id() as i32),
            armed: true,
        }
    }

    /// Send `SIGKILL` to every process in the group. A group that no longer exists is not an
    /// error.
    fn kill(&self) {
        match nix::sys::signal::killpg(self.pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => (),
            Err(e) => warn!("failed to kill process group {}: {}", self.pgid, e),
        }
    }

    /// Kill whatever is left of the process group and release the guard.
    fn release(mut self) {
        self.kill();
        self.armed = false;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if self.armed {
            self.kill();
        }
    }
}

/// Convert a native exit status into a `ProcessExitStatus`.
fn exit_status_of(status: ExitStatus) -> ProcessExitStatus {
    match (status.code(), status.signal()) {
        (Some(code), _) => ProcessExitStatus::Normal(code),
        (None, Some(sig)) => ProcessExitStatus::KilledBySignal(sig),
        (None, None) => ProcessExitStatus::KilledBySignal(0),
    }
}

/// Force-terminate the child and its process group, then reap the child.
fn kill_and_reap(child: &mut Child, guard: ProcessGroupGuard) -> Result<()> {
    guard.kill();
    // The group kill already covers the child; this only matters if it left its group.
    child.kill().ok();
    child.wait()?;
    guard.release();
    Ok(())
}

/// Monitor the given child until it terminates. The child is killed, together with every process
/// in its process group, when the real time limit in `limits` elapses or when `cancellation` is
/// triggered, whichever comes first.
///
/// Returns the exit status of the child and the real time elapsed from `started` until the child
/// exited or its forced termination completed.
pub fn monitor(child: &mut Child, started: Instant, limits: &ProcessResourceLimits,
    cancellation: &CancellationToken) -> Result<(ProcessExitStatus, Duration)> {
    let guard = ProcessGroupGuard::new(child);
    let deadline = limits.real_time_limit.map(|limit| started + limit);

    loop {
        if let Some(status) = child.try_wait()? {
            let elapsed = started.elapsed();
            // Descendants left behind in the group would keep the output pipes open.
            guard.release();
            return Ok((exit_status_of(status), elapsed));
        }

        if cancellation.is_cancelled() {
            trace!("Cancellation requested, killing process {}", child.id());
            kill_and_reap(child, guard)?;
            return Ok((ProcessExitStatus::Cancelled, started.elapsed()));
        }

        let now = Instant::now();
        if let Some(deadline) = deadline {
            if now >= deadline {
                trace!("Real time limit exceeded, killing process {}", child.id());
                kill_and_reap(child, guard)?;
                return Ok((ProcessExitStatus::RealTimeLimitExceeded, started.elapsed()));
            }

            std::thread::sleep(std::cmp::min(WAIT_INTERVAL, deadline - now));
        } else {
            std::thread::sleep(WAIT_INTERVAL);
        }
    }
}
