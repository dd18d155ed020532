use std::fmt;
use std::io;
use std::process::{Child, ExitStatus, Stdio};

use thiserror::Error;

use super::CommandSpec;

/// Exit of a supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    code: Option<i32>,
}

impl ProcessExit {
    /// Builds an exit from a status code; `None` means killed by a signal.
    #[must_use]
    pub const fn from_code(code: Option<i32>) -> Self {
        Self { code }
    }

    /// Status code, absent when the child was killed by a signal.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        self.code
    }

    /// Whether the child exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self::from_code(status.code())
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(formatter, "exit status {code}"),
            None => formatter.write_str("terminated by signal"),
        }
    }
}

/// Handle to a launched background process.
///
/// Dropping the handle neither kills nor waits for the process.
pub trait ChildProcess: Send + fmt::Debug {
    /// Operating-system process id.
    fn pid(&self) -> u32;

    /// Returns the exit if the process has finished, without blocking.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the process status cannot be read.
    fn try_exit(&mut self) -> io::Result<Option<ProcessExit>>;
}

/// Launches background processes.
pub trait ProcessLauncher: Send + Sync {
    /// Spawns `command` without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] when the program cannot be started.
    fn spawn(&self, command: &CommandSpec) -> Result<Box<dyn ChildProcess>, SpawnError>;
}

/// A program could not be started.
#[derive(Debug, Error)]
#[error("failed to launch {program}: {source}")]
pub struct SpawnError {
    /// Program that failed to start.
    pub program: String,
    /// Underlying IO error.
    #[source]
    pub source: io::Error,
}

/// Launcher backed by [`std::process::Command`].
///
/// Children inherit stdout and stderr so their output lands in the container
/// log next to ours; stdin is closed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn spawn(&self, command: &CommandSpec) -> Result<Box<dyn ChildProcess>, SpawnError> {
        let child = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SpawnError {
                program: command.program().display().to_string(),
                source,
            })?;
        Ok(Box::new(SystemChild(child)))
    }
}

#[derive(Debug)]
struct SystemChild(Child);

impl ChildProcess for SystemChild {
    fn pid(&self) -> u32 {
        self.0.id()
    }

    fn try_exit(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self.0.try_wait()?.map(ProcessExit::from))
    }
}
