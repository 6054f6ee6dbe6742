use crate::exec::{stdout_text, Cmd, ExecError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Service control errors
#[derive(Error, Debug)]
pub enum SvcError {
    /// A systemctl invocation failed
    #[error("Service operation '{operation}' failed for '{unit}': {reason}")]
    OperationFailed {
        operation: String,
        unit: String,
        reason: String,
    },

    /// Reloading unit definitions failed
    #[error("daemon-reload failed: {reason}")]
    ReloadFailed { reason: String },

    /// Command execution failed
    #[error("Command execution failed: {0}")]
    Exec(#[from] ExecError),
}

pub type SvcResult<T> = Result<T, SvcError>;

/// Activity state reported by the init system for a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitActivity {
    Active,
    Inactive,
    Failed,
    Activating,
    Unknown,
}

impl UnitActivity {
    fn parse(word: &str) -> Self {
        match word {
            "active" => UnitActivity::Active,
            "inactive" => UnitActivity::Inactive,
            "failed" => UnitActivity::Failed,
            "activating" => UnitActivity::Activating,
            _ => UnitActivity::Unknown,
        }
    }
}

impl std::fmt::Display for UnitActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitActivity::Active => write!(f, "active"),
            UnitActivity::Inactive => write!(f, "inactive"),
            UnitActivity::Failed => write!(f, "failed"),
            UnitActivity::Activating => write!(f, "activating"),
            UnitActivity::Unknown => write!(f, "unknown"),
        }
    }
}

/// State snapshot for a single unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitState {
    pub unit: String,
    pub activity: UnitActivity,
}

/// Wrapper around the host's service manager (systemctl).
///
/// The command name is injectable so tests can point it at a stub instead
/// of a live systemd.
#[derive(Debug, Clone)]
pub struct ServiceManager {
    systemctl: String,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::with_command("systemctl")
    }

    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            systemctl: command.into(),
        }
    }

    fn invoke(&self, operation: &str, unit: &str) -> SvcResult<()> {
        debug!(operation, unit, "systemctl");
        Cmd::new(&self.systemctl)
            .arg(operation)
            .arg(unit)
            .run()
            .map_err(|e| SvcError::OperationFailed {
                operation: operation.to_string(),
                unit: unit.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Reload unit definitions after writing or changing unit files.
    pub fn daemon_reload(&self) -> SvcResult<()> {
        Cmd::new(&self.systemctl)
            .arg("daemon-reload")
            .run()
            .map_err(|e| SvcError::ReloadFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub fn enable(&self, unit: &str) -> SvcResult<()> {
        self.invoke("enable", unit)
    }

    pub fn start(&self, unit: &str) -> SvcResult<()> {
        info!(unit, "Starting service");
        self.invoke("start", unit)
    }

    pub fn stop(&self, unit: &str) -> SvcResult<()> {
        info!(unit, "Stopping service");
        self.invoke("stop", unit)
    }

    pub fn restart(&self, unit: &str) -> SvcResult<()> {
        info!(unit, "Restarting service");
        self.invoke("restart", unit)
    }

    /// Whether a unit is currently active. Exit status alone decides;
    /// systemctl exits non-zero for every non-active state.
    pub fn is_active(&self, unit: &str) -> bool {
        Cmd::new(&self.systemctl)
            .args(["is-active", "--quiet"])
            .arg(unit)
            .probe()
    }

    /// Query the activity state of one unit.
    pub fn unit_state(&self, unit: &str) -> SvcResult<UnitState> {
        // `is-active` exits non-zero for inactive/failed units, which is
        // still a successful query; only a spawn failure is an error.
        let output = Cmd::new(&self.systemctl).arg("is-active").arg(unit).output()?;

        let word = stdout_text(&output);
        let first = word.split_whitespace().next().unwrap_or("");

        Ok(UnitState {
            unit: unit.to_string(),
            activity: UnitActivity::parse(first),
        })
    }

    /// Query the activity state of several units in order.
    pub fn unit_states(&self, units: &[String]) -> SvcResult<Vec<UnitState>> {
        units.iter().map(|unit| self.unit_state(unit)).collect()
    }
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_parsing() {
        assert_eq!(UnitActivity::parse("active"), UnitActivity::Active);
        assert_eq!(UnitActivity::parse("inactive"), UnitActivity::Inactive);
        assert_eq!(UnitActivity::parse("failed"), UnitActivity::Failed);
        assert_eq!(UnitActivity::parse("activating"), UnitActivity::Activating);
        assert_eq!(UnitActivity::parse("garbage"), UnitActivity::Unknown);
        assert_eq!(UnitActivity::parse(""), UnitActivity::Unknown);
    }

    #[test]
    fn test_activity_display_round_trip() {
        for activity in [
            UnitActivity::Active,
            UnitActivity::Inactive,
            UnitActivity::Failed,
            UnitActivity::Activating,
        ] {
            assert_eq!(UnitActivity::parse(&activity.to_string()), activity);
        }
    }

    #[test]
    fn test_stubbed_manager_reports_success() {
        // `true` ignores its arguments and exits zero, standing in for a
        // systemctl where every operation succeeds.
        let manager = ServiceManager::with_command("true");
        assert!(manager.daemon_reload().is_ok());
        assert!(manager.enable("stack-api.service").is_ok());
        assert!(manager.start("stack-api.service").is_ok());
        assert!(manager.is_active("stack-api.service"));
    }

    #[test]
    fn test_stubbed_manager_reports_failure() {
        let manager = ServiceManager::with_command("false");
        assert!(matches!(
            manager.start("stack-api.service"),
            Err(SvcError::OperationFailed { .. })
        ));
        assert!(!manager.is_active("stack-api.service"));
    }

    #[test]
    fn test_unit_state_with_stub_output() {
        // `echo` prints its arguments, so the first stdout word is
        // "is-active" — an unknown activity, but a well-formed query.
        let manager = ServiceManager::with_command("echo");
        let state = manager.unit_state("nginx").unwrap();
        assert_eq!(state.unit, "nginx");
        assert_eq!(state.activity, UnitActivity::Unknown);
    }

    #[test]
    fn test_unit_states_preserve_order() {
        let manager = ServiceManager::with_command("echo");
        let units = vec!["a.service".to_string(), "b.service".to_string()];
        let states = manager.unit_states(&units).unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].unit, "a.service");
        assert_eq!(states[1].unit, "b.service");
    }
}
