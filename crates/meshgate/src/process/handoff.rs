use std::io;

use super::CommandSpec;

/// Transfers control of the process to the application server.
pub trait ServerHandoff {
    /// Replaces the current process image with `command`.
    ///
    /// Only returns when the replacement failed, yielding the reason.
    fn hand_off(&self, command: &CommandSpec) -> io::Error;
}

/// Handoff through `execvp(3)`: the server inherits our pid, environment
/// and standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecHandoff;

impl ServerHandoff for ExecHandoff {
    #[cfg(unix)]
    fn hand_off(&self, command: &CommandSpec) -> io::Error {
        use std::os::unix::process::CommandExt;

        command.to_command().exec()
    }

    #[cfg(not(unix))]
    fn hand_off(&self, _command: &CommandSpec) -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "process replacement requires a unix platform",
        )
    }
}
