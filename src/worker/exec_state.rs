//! The body of the Child Executor's execution path (spec §4.3, steps 1-3): builtin dispatch,
//! watch pre-processing, and handing off to the [`StateExecutor`]. Runs inside the
//! `__exec-state` subprocess; also unit-testable directly without spawning anything.

use serde_json::Value;

use crate::worker::checksum::{ChecksumStore, WatchOutcome};
use crate::worker::state::{StateDescriptor, BUILTIN_COMMENT, BUILTIN_WAIT};
use crate::worker::state_executor::{ExecutionOutcome, StateExecutor};

/// Runs one state to completion, coercing every failure mode into a `FAIL` outcome per the
/// spec's "the child never raises outward" policy (§7). `meta.wait` is never passed here —
/// it is handled by the parent worker thread (Design Note (a), spec §9) and reaching this
/// function with it is a caller bug, reported as a failure rather than panicking.
pub fn run(state: &StateDescriptor, checksum: &dyn ChecksumStore, executor: &dyn StateExecutor) -> ExecutionOutcome {
    if state.module == BUILTIN_COMMENT {
        return ExecutionOutcome::success();
    }
    if state.module == BUILTIN_WAIT {
        return ExecutionOutcome::failure("meta.wait must run on the worker thread, not the Child Executor");
    }

    let mut parameter = state.parameter.clone();
    if let Some(paths) = state.watch_paths() {
        for path in paths {
            match checksum.check(&state.id, &path) {
                Ok(WatchOutcome::Changed) => {
                    parameter.insert("watch".to_string(), Value::Bool(true));
                }
                Ok(WatchOutcome::FirstSeen) | Ok(WatchOutcome::Unchanged) => {
                    parameter.remove("watch");
                }
                Err(err) => return ExecutionOutcome::failure(format!("watched file {path}: {err}")),
            }
        }
    }

    let lowered = match executor.adapt(&state.id, &state.module, &parameter) {
        Ok(lowered) => lowered,
        Err(err) => return ExecutionOutcome::failure(err.to_string()),
    };

    match executor.execute(&lowered) {
        Ok(outcome) => outcome,
        Err(err) => ExecutionOutcome::failure(format!("Internal error: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::checksum::FileChecksumStore;
    use crate::worker::state_executor::ShellStateExecutor;
    use serde_json::Map;
    use std::io::Write;

    fn state(module: &str, parameter: Map<String, Value>) -> StateDescriptor {
        StateDescriptor {
            id: "a".to_string(),
            module: module.to_string(),
            parameter,
        }
    }

    #[test]
    fn comment_is_a_trivial_success() {
        let checksum_dir = tempfile::tempdir().unwrap();
        let checksum = FileChecksumStore::new(checksum_dir.path());
        let executor = ShellStateExecutor::new();
        let outcome = run(&state("meta.comment", Map::new()), &checksum, &executor);
        assert!(outcome.result);
    }

    #[test]
    fn wait_reaching_here_is_reported_as_failure_not_panic() {
        let checksum_dir = tempfile::tempdir().unwrap();
        let checksum = FileChecksumStore::new(checksum_dir.path());
        let executor = ShellStateExecutor::new();
        let outcome = run(&state("meta.wait", Map::new()), &checksum, &executor);
        assert!(!outcome.result);
    }

    #[test]
    fn watch_first_seen_leaves_parameter_unset_then_triggers_on_change() {
        let checksum_dir = tempfile::tempdir().unwrap();
        let checksum = FileChecksumStore::new(checksum_dir.path());
        let executor = ShellStateExecutor::new();

        let mut watched = tempfile::NamedTempFile::new().unwrap();
        writeln!(watched, "v1").unwrap();
        let path = watched.path().to_str().unwrap().to_string();

        let mut parameter = Map::new();
        parameter.insert("cmd".to_string(), Value::String("true".to_string()));
        parameter.insert("watch".to_string(), Value::Array(vec![Value::String(path.clone())]));

        // first pass: no previous digest, watch stays absent
        let first = run(&state("cmd", parameter.clone()), &checksum, &executor);
        assert!(first.result);

        // unchanged: still absent
        let second = run(&state("cmd", parameter.clone()), &checksum, &executor);
        assert!(second.result);

        writeln!(watched, "v2").unwrap();
        let third = run(&state("cmd", parameter), &checksum, &executor);
        assert!(third.result);
    }
}
