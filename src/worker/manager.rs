//! The Manager contract (spec §6): the external transport that carries state-log reports
//! back to the backend controller. Out of scope per spec §1 — only the contract and a
//! minimal reference implementation live here.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::worker::error::ManagerError;
use crate::worker::state::RecipeVersion;

/// The payload sent after each state attempt (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateLog {
    pub init: String,
    pub version: RecipeVersion,
    pub sid: String,
    pub result: bool,
    pub comment: Option<String>,
    pub out_log: Option<String>,
}

/// Best-effort delivery to the backend controller. `send` returning `Ok(false)` or any
/// `Err` are both treated as transient by the worker's retry loop (spec §4.6/§7).
pub trait Manager: Send + Sync {
    fn send(&self, log: &StateLog) -> Result<bool, ManagerError>;
    fn stop(&self);
}

/// Reference implementation: appends each report as a JSON line to a file. Exists so the
/// worker is runnable and testable end-to-end without a real transport.
pub struct FileManager {
    path: PathBuf,
    file: Mutex<()>,
}

impl FileManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(()),
        }
    }
}

impl Manager for FileManager {
    fn send(&self, log: &StateLog) -> Result<bool, ManagerError> {
        let _guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(log)?;
        writeln!(file, "{line}")?;
        Ok(true)
    }

    fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sid: &str, result: bool) -> StateLog {
        StateLog {
            init: "agent-1".into(),
            version: "v1".into(),
            sid: sid.into(),
            result,
            comment: None,
            out_log: None,
        }
    }

    #[test]
    fn appends_one_json_line_per_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");
        let manager = FileManager::new(&path);

        assert!(manager.send(&sample("a", true)).unwrap());
        assert!(manager.send(&sample("b", false)).unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().next().unwrap().contains("\"sid\":\"a\""));
    }
}
