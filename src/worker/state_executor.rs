//! The State Executor contract (spec §6): lowers a state descriptor into a runnable
//! document and runs it. Out of scope per spec §1 — only the contract and a minimal shell
//! based reference implementation live here.

use std::io::Read;

use serde_json::{Map, Value};

use crate::command::{CommandExecutor, CommandHandle, ProcessRunner};
use crate::worker::error::{AdaptError, ExecError};

/// A state descriptor lowered into something runnable. Opaque to the worker; only the
/// [`StateExecutor`] that produced it knows how to run it.
#[derive(Debug, Clone)]
pub struct LoweredState {
    pub module: String,
    pub parameter: Map<String, Value>,
}

/// The outcome of running a lowered state: `result` is the AND of all sub-step results,
/// `comment`/`out_log` concatenate per-sub-step logs (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionOutcome {
    pub result: bool,
    pub comment: Option<String>,
    pub out_log: Option<String>,
}

impl ExecutionOutcome {
    pub fn success() -> Self {
        Self {
            result: true,
            comment: None,
            out_log: None,
        }
    }

    pub fn failure(comment: impl Into<String>) -> Self {
        Self {
            result: false,
            comment: Some(comment.into()),
            out_log: None,
        }
    }
}

/// Lowers and runs a non-builtin state. Implementations run inside the Child Executor
/// process, so `os_type` must stay stable for the process's lifetime.
pub trait StateExecutor: Send + Sync {
    fn adapt(
        &self,
        sid: &str,
        module: &str,
        parameter: &Map<String, Value>,
    ) -> Result<LoweredState, AdaptError>;

    fn execute(&self, lowered: &LoweredState) -> Result<ExecutionOutcome, ExecError>;

    fn os_type(&self) -> &str;
}

/// Reference implementation: the only module it understands is `cmd`, whose `parameter.cmd`
/// is run through the host shell. Standing in for a real configuration-management engine
/// so `meta.*` builtins and the Child Executor plumbing can be exercised end-to-end.
pub struct ShellStateExecutor {
    os_type: String,
}

impl ShellStateExecutor {
    pub fn new() -> Self {
        Self {
            os_type: std::env::consts::OS.to_string(),
        }
    }
}

impl Default for ShellStateExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StateExecutor for ShellStateExecutor {
    fn adapt(
        &self,
        _sid: &str,
        module: &str,
        parameter: &Map<String, Value>,
    ) -> Result<LoweredState, AdaptError> {
        if module != "cmd" {
            return Err(AdaptError::UnknownModule(module.to_string()));
        }
        if !matches!(parameter.get("cmd"), Some(Value::String(_))) {
            return Err(AdaptError::InvalidParameter {
                module: module.to_string(),
                reason: "missing string parameter `cmd`".to_string(),
            });
        }
        Ok(LoweredState {
            module: module.to_string(),
            parameter: parameter.clone(),
        })
    }

    fn execute(&self, lowered: &LoweredState) -> Result<ExecutionOutcome, ExecError> {
        let Some(Value::String(cmd)) = lowered.parameter.get("cmd") else {
            return Err(ExecError::AbnormalExit("lowered state missing `cmd`".to_string()));
        };

        let triggered = matches!(lowered.parameter.get("watch"), Some(Value::Bool(true)));
        let mut args = vec!["-c".to_string(), cmd.clone()];
        if triggered {
            args.push("--".to_string());
            args.push("watch".to_string());
        }

        let mut started = ProcessRunner::new("sh".to_string(), args).start()?;
        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut out) = started.stdout_handle() {
            out.read_to_string(&mut stdout).ok();
        }
        if let Some(mut err) = started.stderr_handle() {
            err.read_to_string(&mut stderr).ok();
        }
        let status = started.wait()?;

        let mut out_log = stdout;
        out_log.push_str(&stderr);

        Ok(ExecutionOutcome {
            result: status.success(),
            comment: (!status.success()).then(|| format!("command exited with {status}")),
            out_log: (!out_log.is_empty()).then_some(out_log),
        })
    }

    fn os_type(&self) -> &str {
        &self.os_type
    }
}
