use crate::step::{Step, StepContext, StepError, StepOutcome, StepResult, StepStatus};
use async_trait::async_trait;
use hostops::HostFacts;
use tracing::info;

/// Checks the host meets the configured resource thresholds before any
/// mutation happens. There is nothing this step can change: an unmet
/// threshold fails the run.
pub struct PreflightStep;

fn shortfalls(facts: &HostFacts, ctx: &StepContext) -> Vec<String> {
    let thresholds = &ctx.config.preflight;
    let mut problems = Vec::new();

    if thresholds.require_root && !facts.is_root {
        problems.push("not running as root".to_string());
    }

    if facts.disk_available_mb < thresholds.min_disk_mb {
        problems.push(format!(
            "needs {} MiB free disk, found {}",
            thresholds.min_disk_mb, facts.disk_available_mb
        ));
    }

    if facts.total_memory_mb < thresholds.min_memory_mb {
        problems.push(format!(
            "needs {} MiB memory, found {}",
            thresholds.min_memory_mb, facts.total_memory_mb
        ));
    }

    problems
}

#[async_trait]
impl Step for PreflightStep {
    fn name(&self) -> &str {
        "preflight"
    }

    async fn check(&self, ctx: &StepContext) -> StepResult<StepStatus> {
        let facts = HostFacts::gather(&ctx.config.install_root)?;
        info!(
            hostname = %facts.hostname,
            disk_mb = facts.disk_available_mb,
            memory_mb = facts.total_memory_mb,
            "Gathered host facts"
        );

        let problems = shortfalls(&facts, ctx);
        if problems.is_empty() {
            Ok(StepStatus::Satisfied)
        } else {
            Ok(StepStatus::Pending(problems.join("; ")))
        }
    }

    async fn apply(&self, ctx: &StepContext) -> StepResult<StepOutcome> {
        let facts = HostFacts::gather(&ctx.config.install_root)?;
        let problems = shortfalls(&facts, ctx);

        if problems.is_empty() {
            Ok(StepOutcome::Unchanged)
        } else {
            Err(StepError::Unsatisfied {
                reason: problems.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployConfig;

    fn ctx_with_thresholds(min_disk_mb: u64, min_memory_mb: u64, require_root: bool) -> StepContext {
        let mut config = DeployConfig::default();
        config.preflight.min_disk_mb = min_disk_mb;
        config.preflight.min_memory_mb = min_memory_mb;
        config.preflight.require_root = require_root;
        config.install_root = std::env::temp_dir();
        StepContext::new(config)
    }

    #[tokio::test]
    async fn test_zero_thresholds_are_satisfied() {
        let ctx = ctx_with_thresholds(0, 0, false);
        let status = PreflightStep.check(&ctx).await.unwrap();
        assert_eq!(status, StepStatus::Satisfied);
    }

    #[tokio::test]
    async fn test_impossible_threshold_is_pending() {
        let ctx = ctx_with_thresholds(u64::MAX, 0, false);
        match PreflightStep.check(&ctx).await.unwrap() {
            StepStatus::Pending(reason) => assert!(reason.contains("free disk")),
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_fails_on_unmet_threshold() {
        let ctx = ctx_with_thresholds(0, u64::MAX, false);
        let result = PreflightStep.apply(&ctx).await;
        assert!(matches!(result, Err(StepError::Unsatisfied { .. })));
    }

    #[tokio::test]
    async fn test_apply_is_noop_when_satisfied() {
        let ctx = ctx_with_thresholds(0, 0, false);
        let outcome = PreflightStep.apply(&ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::Unchanged);
    }
}
