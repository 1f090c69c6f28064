//! Recipe delay (spec §4.2): after a full recipe succeeds, the worker pauses before
//! re-running it. The pause is a real sleeper child with its own process group so a hard
//! abort can cut it short by group-signal rather than needing an in-process timer the
//! worker thread could race against its own `wait()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::command::{kill_group_until_gone, CommandExecutor, CommandHandle, ProcessRunner};
use crate::context::Context;

const KILL_RETRY_CADENCE: Duration = Duration::from_millis(100);

/// Sleeps for `duration`, or until `cancel` is signalled with `true`. A zero duration is a
/// legal no-op (spec §4.2). `cancel` is shared with the worker's hard-abort path; it must
/// outlive this call.
pub fn run(duration: Duration, cancel: &Context<bool>) {
    if duration.is_zero() {
        return;
    }

    let started = match ProcessRunner::new("sh", ["-c", &format!("sleep {}", duration.as_secs_f64())])
        .with_own_process_group()
        .start()
    {
        Ok(started) => started,
        Err(_) => return,
    };
    let pid = started.pid();

    let done = Arc::new(AtomicBool::new(false));
    let watcher_done = done.clone();
    let watcher_cancel = cancel.clone();
    let watcher = thread::spawn(move || loop {
        if watcher_done.load(Ordering::Acquire) {
            return;
        }
        if matches!(watcher_cancel.wait_condvar(), Ok(true)) {
            kill_group_until_gone(pid, KILL_RETRY_CADENCE);
            return;
        }
    });

    let _ = started.wait();
    done.store(true, Ordering::Release);
    let _ = cancel.cancel_all(false);
    let _ = watcher.join();
}
