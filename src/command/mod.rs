mod error;

pub mod processrunner;
pub mod shutdown;
pub mod stream;

pub use crate::command::{processrunner::ProcessRunner, shutdown::kill_group_until_gone};

use std::{process::ExitStatus, sync::mpsc::Sender};

pub use error::CommandError;
use stream::Event;

/// Trait that specifies the interface for a background task execution.
pub trait CommandExecutor {
    type Error: std::error::Error + Send + Sync;
    type Process: CommandHandle;

    fn start(self) -> Result<Self::Process, Self::Error>;
}

pub trait CommandHandle {
    type Error: std::error::Error + Send + Sync;

    fn wait(self) -> Result<ExitStatus, Self::Error>;

    fn get_pid(&self) -> u32;
}

/// Trait that specifies the interface for a blocking task execution.
pub trait CommandRunner {
    type Error: std::error::Error + Send + Sync;

    fn run(self) -> Result<ExitStatus, Self::Error>;
}

/// This trait represents the capability of a command to stream its output, one line at a
/// time, over a channel shared with other commands.
pub trait EventStreamer {
    type Error: std::error::Error + Send + Sync;
    type Handle: CommandHandle;

    fn stream(self, snd: Sender<Event>) -> Result<Self::Handle, Self::Error>;
}
