//! Agent configuration: `salt.delay`, `global.watch`, `module.*`, `init` (spec §2's
//! `[AMBIENT]` Configuration row), deserialised with `serde` + `serde_yaml` and validated at
//! load time.

pub mod error;
pub mod store;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use error::ConfigError;

/// Recipe-delay knob: minutes to pause between full recipe cycles (spec §4.2).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SaltConfig {
    pub delay: u64,
}

/// Cross-cutting agent settings not scoped to a single module.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Directory the checksum store digests watched files under (spec §4.5).
    pub watch: PathBuf,
    /// File the reference `FileManager` appends state-log records to (spec §6). `[AMBIENT]`:
    /// the distilled spec leaves the Manager's transport out of scope; this points the
    /// bundled reference implementation somewhere concrete.
    pub report_log: PathBuf,
}

/// Where to fetch and which version of the configuration-management module set to run.
/// `[SUPPLEMENT]`: the distilled spec treats module loading as out of scope, but the
/// original agent's `module.*` config block is carried here since a real deployment needs
/// somewhere to point at its state modules even though this crate doesn't fetch them.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModuleConfig {
    pub root: PathBuf,
    pub name: String,
    pub mod_repo: String,
    pub mod_tag: String,
}

/// Root agent configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// This agent's identity, sent as `init` on every state-log report (spec §6).
    pub init: String,
    pub salt: SaltConfig,
    pub global: GlobalConfig,
    pub module: ModuleConfig,
}

impl AgentConfig {
    pub fn recipe_delay(&self) -> Duration {
        Duration::from_secs(self.salt.delay * 60)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.init.trim().is_empty() {
            return Err(ConfigError::Invalid("init must not be empty".to_string()));
        }
        if self.module.name.trim().is_empty() {
            return Err(ConfigError::Invalid("module.name must not be empty".to_string()));
        }
        Ok(())
    }
}
