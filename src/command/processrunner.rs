use std::{
    ffi::OsStr,
    io::{BufRead, BufReader},
    process::{Child, Command, Stdio},
    sync::mpsc::Sender,
};

#[cfg(target_family = "unix")]
use std::os::unix::process::CommandExt;

use super::{stream::Metadata, CommandError, CommandExecutor, CommandHandle, CommandRunner, EventStreamer};
use crate::command::stream::{Event, OutputEvent};

pub struct Unstarted {
    cmd: Command,
    /// when true, the child becomes the leader of its own process group (`setsid`) so a
    /// single group-signal reaps it and any grandchildren it spawns.
    own_group: bool,
}
pub struct Started {
    process: Child,
}

pub struct ProcessRunner<State = Unstarted> {
    state: State,
    metadata: Metadata,
}

impl ProcessRunner {
    pub fn new<I, S>(binary_path: S, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(binary_path);
        command.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

        Self {
            state: Unstarted {
                cmd: command,
                own_group: false,
            },
            metadata: Metadata::new("process"),
        }
    }

    /// Makes the spawned child the leader of a new process group, so
    /// [`crate::command::kill_group_until_gone`] can reap it and any descendants it spawns
    /// with a single group-signal.
    pub fn with_own_process_group(mut self) -> Self {
        self.state.own_group = true;
        self
    }

    pub fn with_stdin_piped(mut self) -> Self {
        self.state.cmd.stdin(Stdio::piped());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl CommandExecutor for ProcessRunner {
    type Error = CommandError;
    type Process = ProcessRunner<Started>;

    fn start(mut self) -> Result<Self::Process, Self::Error> {
        #[cfg(target_family = "unix")]
        if self.state.own_group {
            unsafe {
                self.state.cmd.pre_exec(|| {
                    nix::unistd::setsid().map_err(std::io::Error::from)?;
                    Ok(())
                });
            }
        }

        Ok(ProcessRunner {
            state: Started {
                process: self.state.cmd.spawn()?,
            },
            metadata: self.metadata,
        })
    }
}

impl CommandHandle for ProcessRunner<Started> {
    type Error = CommandError;

    fn wait(mut self) -> Result<std::process::ExitStatus, Self::Error> {
        Ok(self.state.process.wait()?)
    }

    fn get_pid(&self) -> u32 {
        self.state.process.id()
    }
}

impl CommandRunner for ProcessRunner {
    type Error = CommandError;

    fn run(self) -> Result<std::process::ExitStatus, Self::Error> {
        self.start()?.wait()
    }
}

impl ProcessRunner<Started> {
    pub fn stdin(&mut self) -> Option<&mut std::process::ChildStdin> {
        self.state.process.stdin.as_mut()
    }

    /// Takes ownership of the child's stdin pipe, so writing to it and dropping the handle
    /// closes it (sending EOF) without waiting for the whole [`ProcessRunner`] to drop.
    pub fn take_stdin(&mut self) -> Option<std::process::ChildStdin> {
        self.state.process.stdin.take()
    }

    /// Takes ownership of the child's stdout pipe, if it was piped and not already taken
    /// (e.g. by [`EventStreamer::stream`]).
    pub fn stdout_handle(&mut self) -> Option<std::process::ChildStdout> {
        self.state.process.stdout.take()
    }

    /// Takes ownership of the child's stderr pipe, if it was piped and not already taken.
    pub fn stderr_handle(&mut self) -> Option<std::process::ChildStderr> {
        self.state.process.stderr.take()
    }

    pub fn pid(&self) -> u32 {
        self.state.process.id()
    }
}

impl EventStreamer for ProcessRunner<Started> {
    type Error = CommandError;
    type Handle = ProcessRunner<Started>;

    fn stream(mut self, snd: Sender<Event>) -> Result<Self::Handle, Self::Error> {
        fn build_err(s: &str) -> CommandError {
            CommandError::IOError(std::io::Error::other(s))
        }
        let stdout = self.state.process.stdout.take().ok_or(build_err("stdout not piped"))?;
        let stderr = self.state.process.stderr.take().ok_or(build_err("stderr not piped"))?;

        let out_metadata = self.metadata.clone();
        let out_snd = snd.clone();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if out_snd
                    .send(Event {
                        metadata: out_metadata.clone(),
                        output: OutputEvent::Stdout(line),
                    })
                    .is_err()
                {
                    return;
                }
            }
        });

        let err_metadata = self.metadata.clone();
        std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if snd
                    .send(Event {
                        metadata: err_metadata.clone(),
                        output: OutputEvent::Stderr(line),
                    })
                    .is_err()
                {
                    return;
                }
            }
        });

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandExecutor;

    #[test]
    fn run_captures_exit_status() {
        let runner = ProcessRunner::new("true", std::iter::empty::<&str>());
        let status = CommandRunner::run(runner).unwrap();
        assert!(status.success());
    }

    #[test]
    fn failing_command_reports_unsuccessful_exit() {
        let runner = ProcessRunner::new("false", std::iter::empty::<&str>());
        let status = CommandRunner::run(runner).unwrap();
        assert!(!status.success());
    }

    #[test]
    fn pid_is_available_once_started() {
        let runner = ProcessRunner::new("sleep", ["0.01"]);
        let started = runner.start().unwrap();
        assert!(started.get_pid() > 0);
        started.wait().unwrap();
    }

    #[test]
    fn streams_stdout_and_stderr_lines() {
        let runner = ProcessRunner::new("sh", ["-c", "echo out; echo err 1>&2"]).start().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let started = EventStreamer::stream(runner, tx).unwrap();
        started.wait().unwrap();

        let mut stdout_lines = Vec::new();
        let mut stderr_lines = Vec::new();
        for event in rx.try_iter() {
            match event.output {
                OutputEvent::Stdout(line) => stdout_lines.push(line),
                OutputEvent::Stderr(line) => stderr_lines.push(line),
            }
        }
        assert_eq!(stdout_lines, vec!["out".to_string()]);
        assert_eq!(stderr_lines, vec!["err".to_string()]);
    }
}
