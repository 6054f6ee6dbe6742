use crate::config::DeployConfig;
use crate::health::HealthProbe;
use crate::step::{Step, StepContext, StepError, StepOutcome, StepResult, StepStatus};
use async_trait::async_trait;
use std::time::Duration;

/// Post-start health gate.
///
/// The old scripts logged health failures as warnings and reported the
/// deploy as done anyway; here an unhealthy endpoint fails the run.
pub struct VerifyStep {
    probe: HealthProbe,
}

impl VerifyStep {
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            probe: HealthProbe::new(config.health_url())
                .with_window(Duration::from_secs(config.health.window_secs))
                .with_interval(Duration::from_secs(config.health.interval_secs)),
        }
    }

    pub fn with_probe(probe: HealthProbe) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl Step for VerifyStep {
    fn name(&self) -> &str {
        "verify"
    }

    async fn check(&self, _ctx: &StepContext) -> StepResult<StepStatus> {
        // Verification always runs; a converged host still has to answer.
        Ok(StepStatus::Pending(format!("probe {}", self.probe.url())))
    }

    async fn apply(&self, _ctx: &StepContext) -> StepResult<StepOutcome> {
        let report = self
            .probe
            .wait_healthy()
            .await
            .map_err(|e| StepError::Verification {
                reason: e.to_string(),
            })?;

        if report.healthy {
            Ok(StepOutcome::Changed(format!(
                "healthy after {} attempts in {:.1}s",
                report.attempts,
                report.elapsed.as_secs_f64()
            )))
        } else {
            Err(StepError::Verification {
                reason: format!(
                    "{} not healthy after {} attempts in {:.1}s: {}",
                    report.url,
                    report.attempts,
                    report.elapsed.as_secs_f64(),
                    report.last_error.unwrap_or_else(|| "no response".to_string())
                ),
            })
        }
    }
}
