use crate::exec::{stderr_snippet, Cmd, ExecError};
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Remote execution errors
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The host did not answer an ssh connection attempt
    #[error("Host '{host}' is not reachable over ssh. Check connectivity and key-based auth.")]
    Unreachable { host: String },

    /// A remote command exited non-zero
    #[error("Remote command on '{host}' failed: {command}: {stderr}")]
    CommandFailed {
        host: String,
        command: String,
        stderr: String,
    },

    /// Copying files to the host failed
    #[error("Failed to copy '{path}' to '{host}': {reason}")]
    CopyFailed {
        host: String,
        path: String,
        reason: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {0}")]
    Exec(#[from] ExecError),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A deployment target reachable over ssh.
///
/// Authentication is key-based only (`BatchMode=yes`); a password prompt
/// would hang an unattended deploy, so it is treated as unreachable instead.
#[derive(Debug, Clone)]
pub struct RemoteHost {
    host: String,
    user: Option<String>,
    port: u16,
    connect_timeout: Duration,
}

impl RemoteHost {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: 22,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The `user@host` (or bare `host`) form ssh and scp take.
    pub fn target(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    fn ssh_cmd(&self) -> Cmd {
        Cmd::new("ssh")
            .args(["-o", "BatchMode=yes"])
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.connect_timeout.as_secs().max(1)
            ))
            .arg("-p")
            .arg(self.port.to_string())
            .arg(self.target())
    }

    /// Probe reachability with a no-op remote command.
    pub fn reachable(&self) -> bool {
        debug!(host = %self.host, "Probing ssh reachability");
        self.ssh_cmd().arg("true").probe()
    }

    /// Run a command on the remote host, failing on non-zero remote exit.
    pub fn run(&self, command: &str) -> RemoteResult<Output> {
        info!(host = %self.host, command, "Running remote command");
        let output = self.ssh_cmd().arg(command).output()?;

        if !output.status.success() {
            return Err(RemoteError::CommandFailed {
                host: self.host.clone(),
                command: command.to_string(),
                stderr: stderr_snippet(&output),
            });
        }

        Ok(output)
    }

    /// Recursively copy a local path into a remote directory via scp.
    pub fn copy(&self, local: &Path, remote_dir: &str) -> RemoteResult<()> {
        info!(
            host = %self.host,
            path = %local.display(),
            remote_dir,
            "Copying to remote host"
        );

        let output = Cmd::new("scp")
            .args(["-o", "BatchMode=yes"])
            .arg("-P")
            .arg(self.port.to_string())
            .arg("-r")
            .arg(local.display().to_string())
            .arg(format!("{}:{}", self.target(), remote_dir))
            .output()?;

        if !output.status.success() {
            return Err(RemoteError::CopyFailed {
                host: self.host.clone(),
                path: local.display().to_string(),
                reason: stderr_snippet(&output),
            });
        }

        Ok(())
    }
}
