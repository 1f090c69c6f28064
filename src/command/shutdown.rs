use std::time::Duration;

#[cfg(target_family = "unix")]
use nix::{sys::signal::{self, Signal}, unistd::Pid};

/// Sends `SIGKILL` to the process group rooted at `pid` every `cadence` until the group no
/// longer exists (`ESRCH`). Used by the recipe delay and the Child Executor's hard-abort
/// path, where the spec calls for a bounded group-kill retry loop rather than a single
/// signal-and-hope.
#[cfg(target_family = "unix")]
pub fn kill_group_until_gone(pid: u32, cadence: Duration) {
    let group = Pid::from_raw(-(pid as i32));
    loop {
        match signal::kill(group, Signal::SIGKILL) {
            Err(nix::errno::Errno::ESRCH) => return,
            _ => std::thread::sleep(cadence),
        }
    }
}
