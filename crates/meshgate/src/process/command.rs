use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

const REDACTED: &str = "<redacted>";

#[derive(Clone, PartialEq, Eq)]
enum Argument {
    Plain(String),
    Secret { prefix: String, value: String },
}

impl Argument {
    fn render(&self) -> String {
        match self {
            Self::Plain(value) => value.clone(),
            Self::Secret { prefix, value } => format!("{prefix}{value}"),
        }
    }

    fn redacted(&self) -> String {
        match self {
            Self::Plain(value) => value.clone(),
            Self::Secret { prefix, .. } => format!("{prefix}{REDACTED}"),
        }
    }
}

/// Program, arguments and extra environment of a process to launch.
///
/// Secret arguments are passed to the child verbatim but never appear in
/// [`fmt::Display`] or [`fmt::Debug`] output.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<Argument>,
    envs: Vec<(String, String)>,
}

impl CommandSpec {
    /// Starts a command for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Argument::Plain(value.into()));
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(values.into_iter().map(|value| Argument::Plain(value.into())));
        self
    }

    /// Appends `{prefix}{value}` as one argument, rendering only the prefix
    /// in logs.
    #[must_use]
    pub fn secret_arg(mut self, prefix: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(Argument::Secret {
            prefix: prefix.into(),
            value: value.into(),
        });
        self
    }

    /// Sets an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Program to run.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Final file-name component of the program, used in diagnostics.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.file_name().map_or_else(
            || self.program.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    /// Arguments exactly as the child receives them.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        self.args.iter().map(Argument::render).collect()
    }

    /// Arguments with secrets masked.
    #[must_use]
    pub fn redacted_arguments(&self) -> Vec<String> {
        self.args.iter().map(Argument::redacted).collect()
    }

    /// Extra environment variables for the child.
    #[must_use]
    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }

    /// Builds the [`Command`] that launches this process.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.arguments());
        command.envs(self.envs.iter().map(|(key, value)| (key, value)));
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.program.display())?;
        for argument in self.redacted_arguments() {
            write!(formatter, " {argument}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.redacted_arguments())
            .field("envs", &self.envs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn up_command() -> CommandSpec {
        CommandSpec::new("tailscale")
            .arg("up")
            .secret_arg("--authkey=", "tskey-auth-abc123")
            .arg("--ssh")
    }

    #[test]
    fn secrets_reach_the_child() {
        assert_eq!(
            up_command().arguments(),
            ["up", "--authkey=tskey-auth-abc123", "--ssh"]
        );
    }

    #[test]
    fn secrets_never_render() {
        let command = up_command();
        let shown = command.to_string();
        let debugged = format!("{command:?}");
        assert_eq!(shown, "tailscale up --authkey=<redacted> --ssh");
        assert!(!debugged.contains("tskey-auth-abc123"), "{debugged}");
    }

    #[test]
    fn command_carries_extra_environment() {
        let command = CommandSpec::new("gunicorn").env("PORT", "9090").to_command();
        let envs: Vec<_> = command.get_envs().collect();
        assert_eq!(
            envs,
            [(std::ffi::OsStr::new("PORT"), Some(std::ffi::OsStr::new("9090")))]
        );
    }

    #[test]
    fn program_name_drops_directories() {
        assert_eq!(
            CommandSpec::new("/usr/local/bin/tailscaled").program_name(),
            "tailscaled"
        );
    }
}
