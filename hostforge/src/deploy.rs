use crate::config::DeployConfig;
use crate::health::{HealthError, HealthProbe};
use hostops::{RemoteError, RemoteHost};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Remote deployment errors
#[derive(Error, Debug)]
pub enum DeployError {
    /// Remote execution or staging failed
    #[error("Remote operation failed: {0}")]
    Remote(#[from] RemoteError),

    /// Health probe could not be built
    #[error("Health probe failed: {0}")]
    Health(#[from] HealthError),

    /// The deployed stack never answered its health endpoint
    #[error("Deployed stack at {url} is not healthy: {detail}")]
    Unhealthy { url: String, detail: String },

    /// The local payload directory does not exist
    #[error("Payload directory '{path}' does not exist")]
    MissingPayload { path: String },
}

pub type DeployResult<T> = Result<T, DeployError>;

/// Copy-and-run deployment to one remote host.
///
/// The bundle is whatever the controller has locally: the deployment
/// config plus an optional payload directory. Nothing is fetched from a
/// repository on the target; the copied bundle is the single source of
/// truth for what gets provisioned.
pub struct DeployPlan {
    pub target: RemoteHost,
    pub config_path: PathBuf,
    pub payload_dir: Option<PathBuf>,
    /// Staging directory on the target
    pub remote_root: String,
    pub verify: bool,
}

impl DeployPlan {
    fn remote_config_path(&self) -> String {
        let file_name = self
            .config_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deploy.toml".to_string());
        format!("{}/{}", self.remote_root.trim_end_matches('/'), file_name)
    }

    /// The provisioning invocation run on the target.
    pub fn provision_command(&self) -> String {
        format!("hostforge provision --config {}", self.remote_config_path())
    }

    /// Execute the deployment: probe reachability, stage the bundle, run
    /// the sequencer remotely, then confirm health from the outside.
    pub async fn execute(&self, config: &DeployConfig) -> DeployResult<()> {
        if let Some(payload) = &self.payload_dir {
            if !payload.is_dir() {
                return Err(DeployError::MissingPayload {
                    path: payload.display().to_string(),
                });
            }
        }

        if !self.target.reachable() {
            return Err(RemoteError::Unreachable {
                host: self.target.host().to_string(),
            }
            .into());
        }

        info!(host = self.target.host(), "Staging deployment bundle");
        self.target
            .run(&format!("mkdir -p {}", self.remote_root))?;
        self.target.copy(&self.config_path, &self.remote_root)?;

        if let Some(payload) = &self.payload_dir {
            self.target.copy(payload, &self.remote_root)?;
        }

        info!(host = self.target.host(), "Running remote provisioning");
        self.target.run(&self.provision_command())?;

        if self.verify {
            let url = format!(
                "http://{}:{}{}",
                self.target.host(),
                config.health.port,
                config.health.path
            );
            let probe = HealthProbe::new(&url)
                .with_window(Duration::from_secs(config.health.window_secs))
                .with_interval(Duration::from_secs(config.health.interval_secs));

            let report = probe.wait_healthy().await?;
            if !report.healthy {
                return Err(DeployError::Unhealthy {
                    url,
                    detail: report
                        .last_error
                        .unwrap_or_else(|| "no response".to_string()),
                });
            }
        }

        info!(host = self.target.host(), "Deployment finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> DeployPlan {
        DeployPlan {
            target: RemoteHost::new("deploy.example.org").with_user("ops"),
            config_path: PathBuf::from("/tmp/bundles/deploy.toml"),
            payload_dir: None,
            remote_root: "/opt/stack/payload/".to_string(),
            verify: true,
        }
    }

    #[test]
    fn test_remote_config_path_joins_cleanly() {
        assert_eq!(
            plan().remote_config_path(),
            "/opt/stack/payload/deploy.toml"
        );
    }

    #[test]
    fn test_provision_command() {
        assert_eq!(
            plan().provision_command(),
            "hostforge provision --config /opt/stack/payload/deploy.toml"
        );
    }

    #[tokio::test]
    async fn test_missing_payload_fails_before_any_remote_work() {
        let mut p = plan();
        p.payload_dir = Some(PathBuf::from("/no/such/payload"));
        let result = p.execute(&DeployConfig::default()).await;
        assert!(matches!(result, Err(DeployError::MissingPayload { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_target_aborts() {
        let mut p = plan();
        p.target = RemoteHost::new("127.0.0.1")
            .with_port(9)
            .with_connect_timeout(Duration::from_secs(1));
        let result = p.execute(&DeployConfig::default()).await;
        assert!(matches!(
            result,
            Err(DeployError::Remote(RemoteError::Unreachable { .. }))
        ));
    }
}
