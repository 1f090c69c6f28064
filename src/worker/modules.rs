//! Module-set reload (spec §4.1 step 3): before starting a recipe cycle from state 0, the
//! worker gives the configured module set a chance to pick up a new revision. Modeled as an
//! explicit value with a `reload()` operation per the source's hot re-`import`/`reload()` of
//! its adaptor and runner modules (spec §9 design note): [`ModuleSet`] owns whatever lives
//! under `module.root/module.name`, and `reload()` is invoked once per cycle rather than the
//! source's in-process code-swap.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModuleLoadError {
    #[error("module set '{name}' not found under {root}")]
    NotFound { root: String, name: String },
}

/// Owns the configuration-management module set the [`crate::worker::state_executor::StateExecutor`]
/// adapts/executes against. `reload()` runs once per recipe cycle, right before state 0.
pub trait ModuleSet: Send + Sync {
    fn reload(&self) -> Result<(), ModuleLoadError>;
}

/// Reference implementation: verifies `module.root/module.name` exists. Fetching and
/// checking out the `mod_repo`/`mod_tag` revision is module-repository fetch, out of scope
/// per spec §1 — a real deployment's packaging is expected to have populated the directory
/// before the agent starts.
pub struct DirectoryModuleSet {
    root: PathBuf,
    name: String,
}

impl DirectoryModuleSet {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }
}

impl ModuleSet for DirectoryModuleSet {
    fn reload(&self) -> Result<(), ModuleLoadError> {
        let path = self.root.join(&self.name);
        if path.is_dir() {
            Ok(())
        } else {
            Err(ModuleLoadError::NotFound {
                root: self.root.display().to_string(),
                name: self.name.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_succeeds_when_module_directory_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("base")).unwrap();
        let modules = DirectoryModuleSet::new(dir.path(), "base");
        assert!(modules.reload().is_ok());
    }

    #[test]
    fn reload_fails_when_module_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let modules = DirectoryModuleSet::new(dir.path(), "base");
        assert!(matches!(modules.reload(), Err(ModuleLoadError::NotFound { .. })));
    }
}
