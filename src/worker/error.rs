use thiserror::Error;

/// Errors raised directly to callers of the worker's control surface.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("invalid recipe: {0}")]
    InvalidRecipe(String),
}

/// Errors surfaced while lowering a state descriptor into a runnable document.
#[derive(Error, Debug)]
pub enum AdaptError {
    #[error("unknown module: {0}")]
    UnknownModule(String),
    #[error("invalid parameter for module {module}: {reason}")]
    InvalidParameter { module: String, reason: String },
}

/// Errors surfaced while executing an already-lowered document.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("process exited abnormally: {0}")]
    AbnormalExit(String),
    #[error("command error: {0}")]
    Command(#[from] crate::command::CommandError),
}

/// Errors from the watch-trigger checksum store.
#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("could not read watched file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not persist checksum for {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt checksum record for {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from the reference [`crate::worker::manager::Manager`] implementation.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("no manager configured")]
    NoManager,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
