use std::process::{Command, Output, Stdio};
use thiserror::Error;

/// Errors from running host commands
#[derive(Error, Debug)]
pub enum ExecError {
    /// The command could not be spawned at all
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited with a non-zero status
    #[error("Command '{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

pub type ExecResult<T> = Result<T, ExecError>;

/// A host command to execute.
///
/// Thin builder over [`std::process::Command`] that keeps the rendered
/// command line around so error messages can name exactly what failed.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The command line as it will be reported in errors and logs.
    pub fn rendered(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run the command and capture its output. Only spawning can fail here;
    /// callers that care about the exit status use [`Cmd::run`].
    pub fn output(&self) -> ExecResult<Output> {
        self.command().output().map_err(|source| ExecError::Spawn {
            command: self.rendered(),
            source,
        })
    }

    /// Run the command, treating a non-zero exit status as an error.
    pub fn run(&self) -> ExecResult<Output> {
        let output = self.output()?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(ExecError::Failed {
                command: self.rendered(),
                status: output
                    .status
                    .code()
                    .map(|c| format!("status {c}"))
                    .unwrap_or_else(|| "signal".to_string()),
                stderr: stderr_snippet(&output),
            })
        }
    }

    /// Availability probe: true when the command runs and exits zero.
    /// All output is suppressed.
    pub fn probe(&self) -> bool {
        self.command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }
}

/// Trimmed, lossy stderr for error messages.
pub fn stderr_snippet(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Trimmed, lossy stdout.
pub fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
