use crate::exec::{Cmd, ExecError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Account provisioning errors
#[derive(Error, Debug)]
pub enum AccountError {
    /// Group creation failed
    #[error("Failed to create group '{group}': {reason}")]
    GroupCreateFailed { group: String, reason: String },

    /// User creation failed
    #[error("Failed to create user '{user}': {reason}")]
    UserCreateFailed { user: String, reason: String },

    /// Command execution failed
    #[error("Command execution failed: {0}")]
    Exec(#[from] ExecError),
}

pub type AccountResult<T> = Result<T, AccountError>;

/// Whether an ensure-style operation had to do anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    Created,
    AlreadyPresent,
}

/// Specification for a service account
#[derive(Debug, Clone)]
pub struct SystemUserSpec {
    /// Account name
    pub name: String,
    /// Primary group (created first if absent)
    pub group: String,
    /// Home directory; useradd's default when unset
    pub home: Option<PathBuf>,
    /// Login shell; service accounts get nologin
    pub shell: String,
}

impl SystemUserSpec {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            home: None,
            shell: "/usr/sbin/nologin".to_string(),
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

/// Check whether a group exists, via getent.
pub fn group_exists(name: &str) -> bool {
    Cmd::new("getent").arg("group").arg(name).probe()
}

/// Check whether a user exists, via getent.
pub fn user_exists(name: &str) -> bool {
    Cmd::new("getent").arg("passwd").arg(name).probe()
}

/// Create a group if it does not already exist.
pub fn ensure_group(name: &str) -> AccountResult<Ensured> {
    if group_exists(name) {
        debug!(group = name, "Group already present");
        return Ok(Ensured::AlreadyPresent);
    }

    info!(group = name, "Creating group");
    Cmd::new("groupadd")
        .arg("--system")
        .arg(name)
        .run()
        .map_err(|e| AccountError::GroupCreateFailed {
            group: name.to_string(),
            reason: e.to_string(),
        })?;

    Ok(Ensured::Created)
}

/// Create a system user if it does not already exist.
///
/// The primary group is ensured first so useradd never races against a
/// missing group.
pub fn ensure_system_user(spec: &SystemUserSpec) -> AccountResult<Ensured> {
    ensure_group(&spec.group)?;

    if user_exists(&spec.name) {
        debug!(user = %spec.name, "User already present");
        return Ok(Ensured::AlreadyPresent);
    }

    info!(user = %spec.name, "Creating system user");
    let mut cmd = Cmd::new("useradd")
        .arg("--system")
        .arg("--gid")
        .arg(&spec.group)
        .arg("--shell")
        .arg(&spec.shell);

    cmd = match &spec.home {
        Some(home) => cmd
            .arg("--create-home")
            .arg("--home-dir")
            .arg(home.display().to_string()),
        None => cmd.arg("--no-create-home"),
    };

    cmd.arg(&spec.name)
        .run()
        .map_err(|e| AccountError::UserCreateFailed {
            user: spec.name.clone(),
            reason: e.to_string(),
        })?;

    Ok(Ensured::Created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_exists() {
        assert!(user_exists("root"));
        assert!(group_exists("root"));
    }

    #[test]
    fn test_missing_account_does_not_exist() {
        assert!(!user_exists("hostops-no-such-user-xyz"));
        assert!(!group_exists("hostops-no-such-group-xyz"));
    }

    #[test]
    fn test_ensure_group_is_idempotent_for_present_group() {
        let result = ensure_group("root").unwrap();
        assert_eq!(result, Ensured::AlreadyPresent);
    }

    #[test]
    fn test_user_spec_builder() {
        let spec = SystemUserSpec::new("stack", "stack")
            .with_home("/opt/stack")
            .with_shell("/bin/sh");
        assert_eq!(spec.name, "stack");
        assert_eq!(spec.group, "stack");
        assert_eq!(spec.home, Some(PathBuf::from("/opt/stack")));
        assert_eq!(spec.shell, "/bin/sh");
    }

    #[test]
    fn test_default_shell_is_nologin() {
        let spec = SystemUserSpec::new("stack", "stack");
        assert_eq!(spec.shell, "/usr/sbin/nologin");
        assert!(spec.home.is_none());
    }
}
