//! Per-`(sid, path)` file-digest cache backing the `watch` trigger (spec §4.5).
//!
//! Grounded on the teacher's `HashRepository` trait + file-backed implementation
//! (`config/remote_config_hash.rs`): a trait for the operation, and a small file-per-record
//! implementation content-addressed with SHA-256.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::worker::error::ChecksumError;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
struct Record {
    digest: String,
}

/// Outcome of checking a watched file against the store.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WatchOutcome {
    /// No prior digest existed; the baseline was stored, `watch` stays unset.
    FirstSeen,
    /// The digest changed since the last check; `watch` should be set to `true`.
    Changed,
    /// The digest is unchanged; `watch` should be stripped.
    Unchanged,
}

pub trait ChecksumStore {
    fn check(&self, sid: &str, path: &str) -> Result<WatchOutcome, ChecksumError>;
}

/// Digests watched files under a configured directory, one YAML record per `(sid, path)`.
pub struct FileChecksumStore {
    root: PathBuf,
}

impl FileChecksumStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, sid: &str, path: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(sid.as_bytes());
        hasher.update(b"\0");
        hasher.update(path.as_bytes());
        let key = hex(&hasher.finalize());
        self.root.join(format!("{key}.yaml"))
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn digest_file(path: &Path) -> Result<String, ChecksumError> {
    let content = fs::read(path).map_err(|source| ChecksumError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex(&hasher.finalize()))
}

impl ChecksumStore for FileChecksumStore {
    fn check(&self, sid: &str, path: &str) -> Result<WatchOutcome, ChecksumError> {
        let digest = digest_file(Path::new(path))?;
        let record_path = self.record_path(sid, path);

        let previous = match fs::read_to_string(&record_path) {
            Ok(content) => Some(serde_yaml::from_str::<Record>(&content).map_err(|source| {
                ChecksumError::Decode {
                    path: path.to_string(),
                    source,
                }
            })?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(ChecksumError::Io {
                    path: path.to_string(),
                    source,
                })
            }
        };

        let outcome = match &previous {
            None => WatchOutcome::FirstSeen,
            Some(record) if record.digest == digest => WatchOutcome::Unchanged,
            Some(_) => WatchOutcome::Changed,
        };

        if !matches!(outcome, WatchOutcome::Unchanged) {
            if let Some(parent) = record_path.parent() {
                fs::create_dir_all(parent).map_err(|source| ChecksumError::Persist {
                    path: path.to_string(),
                    source,
                })?;
            }
            let serialized = serde_yaml::to_string(&Record { digest }).unwrap_or_default();
            fs::write(&record_path, serialized).map_err(|source| ChecksumError::Persist {
                path: path.to_string(),
                source,
            })?;
        }

        Ok(outcome)
    }
}
