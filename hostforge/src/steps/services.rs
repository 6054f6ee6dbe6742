use crate::step::{Step, StepContext, StepOutcome, StepResult, StepStatus};
use async_trait::async_trait;
use tracing::info;

/// Reloads unit definitions, then enables and starts every managed unit,
/// proxy included.
pub struct ServicesStep;

#[async_trait]
impl Step for ServicesStep {
    fn name(&self) -> &str {
        "services"
    }

    async fn check(&self, ctx: &StepContext) -> StepResult<StepStatus> {
        let inactive: Vec<String> = ctx
            .config
            .managed_units()
            .into_iter()
            .filter(|unit| !ctx.svc.is_active(unit))
            .collect();

        if inactive.is_empty() {
            Ok(StepStatus::Satisfied)
        } else {
            Ok(StepStatus::Pending(format!(
                "units not active: {}",
                inactive.join(", ")
            )))
        }
    }

    async fn apply(&self, ctx: &StepContext) -> StepResult<StepOutcome> {
        ctx.svc.daemon_reload()?;

        let mut started = Vec::new();
        for unit in ctx.config.managed_units() {
            if ctx.svc.is_active(&unit) {
                continue;
            }
            ctx.svc.enable(&unit)?;
            ctx.svc.start(&unit)?;
            started.push(unit);
        }

        if started.is_empty() {
            Ok(StepOutcome::Unchanged)
        } else {
            info!(units = ?started, "Services started");
            Ok(StepOutcome::Changed(format!(
                "started {}",
                started.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployConfig;
    use hostops::{PackageManager, ServiceManager};

    fn ctx_with_systemctl(command: &str) -> StepContext {
        StepContext::with_subsystems(
            DeployConfig::default(),
            PackageManager::None,
            ServiceManager::with_command(command),
        )
    }

    #[tokio::test]
    async fn test_all_active_is_satisfied() {
        let ctx = ctx_with_systemctl("true");
        let status = ServicesStep.check(&ctx).await.unwrap();
        assert_eq!(status, StepStatus::Satisfied);
    }

    #[tokio::test]
    async fn test_inactive_units_are_pending() {
        let ctx = ctx_with_systemctl("false");
        match ServicesStep.check(&ctx).await.unwrap() {
            StepStatus::Pending(reason) => {
                assert!(reason.contains("stack-api.service"));
                assert!(reason.contains("nginx"));
            }
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_with_everything_active_is_unchanged() {
        let ctx = ctx_with_systemctl("true");
        let outcome = ServicesStep.apply(&ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_apply_propagates_systemctl_failure() {
        // Every invocation fails, including daemon-reload.
        let ctx = ctx_with_systemctl("false");
        assert!(ServicesStep.apply(&ctx).await.is_err());
    }
}
