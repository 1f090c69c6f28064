//! The Child Executor (spec §4.3): runs exactly one non-builtin state in an isolated
//! process and reports back a result triple. Re-execs the current binary with the hidden
//! `__exec-state` subcommand instead of `fork()`-ing, writes the state descriptor to the
//! child's stdin, and reads the JSON outcome back from its stdout — the same
//! single-write/single-read contract as the spec's shared slot, built on the teacher's
//! `ProcessRunner`/`CommandExecutor` plumbing.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::command::{kill_group_until_gone, processrunner::Started, CommandExecutor, CommandHandle, ProcessRunner};
use crate::worker::error::ExecError;
use crate::worker::state::StateDescriptor;
use crate::worker::state_executor::ExecutionOutcome;

const KILL_RETRY_CADENCE: Duration = Duration::from_millis(100);

/// Starts exactly one state in an isolated process. Implementations must guarantee at most
/// one [`RunningStep`] is live per instance (spec invariant 1); the worker enforces this by
/// construction, never calling `start` again before the previous handle is consumed.
pub trait StepRunner: Send + Sync {
    fn start(&self, state: &StateDescriptor) -> Result<Box<dyn RunningStep>, ExecError>;
}

/// A live or already-finished Child Executor invocation. Shared (as `Arc<dyn RunningStep>`)
/// between the worker thread, which blocks in [`Self::wait`], and the control surface, which
/// may call [`Self::kill`] from another thread at any time.
pub trait RunningStep: Send + Sync {
    /// Blocks until the child exits and returns its reported outcome. Never fails: any
    /// internal error is coerced into a `FAIL` outcome, matching the spec's "the child
    /// never raises outward" propagation policy (§7). Calling this more than once returns
    /// a `FAIL` outcome rather than panicking.
    fn wait(&self) -> ExecutionOutcome;

    /// Hard-terminates the child's whole process group. Safe to call concurrently with
    /// another thread blocked in [`Self::wait`].
    fn kill(&self);
}

/// Production [`StepRunner`]: re-execs `binary __exec-state` for every state.
pub struct ReExecStepRunner {
    binary: PathBuf,
    checksum_root: PathBuf,
}

impl ReExecStepRunner {
    pub fn new(binary: impl Into<PathBuf>, checksum_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            checksum_root: checksum_root.into(),
        }
    }
}

impl StepRunner for ReExecStepRunner {
    fn start(&self, state: &StateDescriptor) -> Result<Box<dyn RunningStep>, ExecError> {
        let payload = serde_json::to_vec(state).map_err(|err| ExecError::AbnormalExit(err.to_string()))?;

        let mut started = ProcessRunner::new(
            self.binary.display().to_string(),
            vec![
                "__exec-state".to_string(),
                "--checksum-root".to_string(),
                self.checksum_root.display().to_string(),
            ],
        )
        .with_stdin_piped()
        .with_own_process_group()
        .start()?;

        if let Some(mut stdin) = started.take_stdin() {
            stdin.write_all(&payload)?;
        }

        let stdout = started.stdout_handle();
        let pid = started.pid();

        Ok(Box::new(ChildExecutorHandle {
            pid,
            process: Mutex::new(Some(started)),
            stdout: Mutex::new(stdout),
        }))
    }
}

struct ChildExecutorHandle {
    pid: u32,
    process: Mutex<Option<ProcessRunner<Started>>>,
    stdout: Mutex<Option<std::process::ChildStdout>>,
}

impl RunningStep for ChildExecutorHandle {
    fn wait(&self) -> ExecutionOutcome {
        let mut buf = String::new();
        if let Some(mut stdout) = self.stdout.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = stdout.read_to_string(&mut buf);
        }

        let process = self.process.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(process) = process else {
            return ExecutionOutcome::failure("Internal error: child already reaped");
        };

        match process.wait() {
            Ok(status) if status.success() => serde_json::from_str::<ExecutionOutcome>(&buf)
                .unwrap_or_else(|err| ExecutionOutcome::failure(format!("Internal error: {err}"))),
            Ok(status) => ExecutionOutcome::failure(format!("Internal error: {status}")),
            Err(err) => ExecutionOutcome::failure(format!("Internal error: {err}")),
        }
    }

    fn kill(&self) {
        kill_group_until_gone(self.pid, KILL_RETRY_CADENCE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_for(cmd: &[&str]) -> ChildExecutorHandle {
        let mut started = ProcessRunner::new(cmd[0], cmd[1..].iter().copied())
            .with_own_process_group()
            .start()
            .unwrap();
        let stdout = started.stdout_handle();
        let pid = started.pid();
        ChildExecutorHandle {
            pid,
            process: Mutex::new(Some(started)),
            stdout: Mutex::new(stdout),
        }
    }

    #[test]
    fn wait_reports_failure_on_malformed_stdout() {
        let handle = handle_for(&["sh", "-c", "echo not-json"]);
        let outcome = handle.wait();
        assert!(!outcome.result);
    }

    #[test]
    fn wait_parses_valid_outcome_json() {
        let handle = handle_for(&[
            "sh",
            "-c",
            r#"printf '{"result":true,"comment":null,"out_log":null}'"#,
        ]);
        let outcome = handle.wait();
        assert!(outcome.result);
    }

    #[test]
    fn kill_terminates_long_running_group_promptly() {
        let handle = handle_for(&["sh", "-c", "trap '' TERM; while true; do sleep 1; done"]);
        let started = std::time::Instant::now();
        handle.kill();
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
