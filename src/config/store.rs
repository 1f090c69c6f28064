//! Loads an [`AgentConfig`] from disk. Grounded on the teacher's `SuperAgentConfigStoreFile`
//! (`config/store.rs`): a trait for the operation plus a single file-backed implementation,
//! minus the local/remote-overlay merge this crate has no use for.

use std::path::PathBuf;

use super::{error::ConfigError, AgentConfig};

pub trait ConfigStore {
    fn load(&self) -> Result<AgentConfig, ConfigError>;
}

pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<AgentConfig, ConfigError> {
        let file = std::fs::File::open(&self.path)?;
        let config: AgentConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    #[test]
    fn loads_a_well_formed_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
init: agent-1
salt:
  delay: 5
global:
  watch: /var/lib/states-agent/watch
  report_log: /var/lib/states-agent/reports.jsonl
module:
  root: /srv/modules
  name: base
  mod_repo: https://example.invalid/modules.git
  mod_tag: v1
"#
        )
        .unwrap();

        let config = FileConfigStore::new(file.path()).load().unwrap();
        assert_eq!(config.init, "agent-1");
        assert_eq!(config.salt.delay, 5);
    }

    #[test]
    fn rejects_a_config_missing_required_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "init: agent-1").unwrap();

        let err = FileConfigStore::new(file.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::Decode(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = FileConfigStore::new(Path::new("/no/such/config.yaml")).load().unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
