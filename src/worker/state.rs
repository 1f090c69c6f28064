use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque recipe version tag. The worker never interprets its contents, only compares it
/// for equality when deciding whether a previously loaded recipe still applies.
pub type RecipeVersion = String;

/// A single declarative configuration step.
///
/// `parameter` is module-specific; the reserved key `watch`, when present, holds an
/// ordered list of absolute file paths (see [`crate::worker::checksum`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateDescriptor {
    pub id: String,
    pub module: String,
    #[serde(default)]
    pub parameter: Map<String, Value>,
}

pub const BUILTIN_WAIT: &str = "meta.wait";
pub const BUILTIN_COMMENT: &str = "meta.comment";

impl StateDescriptor {
    pub fn watch_paths(&self) -> Option<Vec<String>> {
        match self.parameter.get("watch") {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// An ordered, finite sequence of states plus a version tag. Only one recipe is active at
/// a time; loading a new one atomically replaces the previous one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Recipe {
    pub version: RecipeVersion,
    pub states: Vec<StateDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_watch_paths() {
        let mut parameter = Map::new();
        parameter.insert(
            "watch".into(),
            Value::Array(vec![Value::String("/tmp/a".into()), Value::String("/tmp/b".into())]),
        );
        let state = StateDescriptor {
            id: "s".into(),
            module: "cmd".into(),
            parameter,
        };
        assert_eq!(
            state.watch_paths(),
            Some(vec!["/tmp/a".to_string(), "/tmp/b".to_string()])
        );
    }

    #[test]
    fn no_watch_paths_when_absent() {
        let state = StateDescriptor {
            id: "s".into(),
            module: "cmd".into(),
            parameter: Map::new(),
        };
        assert_eq!(state.watch_paths(), None);
    }
}
