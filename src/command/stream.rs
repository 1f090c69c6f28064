use std::collections::BTreeMap;

/// One line of output from a running process, tagged with which stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Stdout(String),
    Stderr(String),
}

/// Free-form metadata attached to every [`Event`] emitted by a given process, so a
/// listener draining a shared channel can tell whose output it's looking at.
#[derive(Debug, Clone, Default)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new(id: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), id.into());
        Self(values)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub metadata: Metadata,
    pub output: OutputEvent,
}
