use crate::step::{Step, StepContext, StepOutcome, StepResult, StepStatus};
use async_trait::async_trait;
use hostops::pkg;

/// Installs the configured OS packages, touching only the missing ones.
pub struct PackagesStep;

#[async_trait]
impl Step for PackagesStep {
    fn name(&self) -> &str {
        "packages"
    }

    async fn check(&self, ctx: &StepContext) -> StepResult<StepStatus> {
        if ctx.config.packages.is_empty() {
            return Ok(StepStatus::Satisfied);
        }

        let present = pkg::installed(ctx.pkg, &ctx.config.packages)?;
        let missing: Vec<&String> = ctx
            .config
            .packages
            .iter()
            .filter(|p| !present.contains(p))
            .collect();

        if missing.is_empty() {
            Ok(StepStatus::Satisfied)
        } else {
            Ok(StepStatus::Pending(format!(
                "{} packages missing: {}",
                missing.len(),
                missing
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    async fn apply(&self, ctx: &StepContext) -> StepResult<StepOutcome> {
        let plan = pkg::install_missing(ctx.pkg, &ctx.config.packages)?;

        if plan.is_noop() {
            Ok(StepOutcome::Unchanged)
        } else {
            Ok(StepOutcome::Changed(format!(
                "installed {} packages ({} already present)",
                plan.installed.len(),
                plan.already_present.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployConfig;
    use hostops::PackageManager;
    use hostops::ServiceManager;

    #[tokio::test]
    async fn test_empty_package_list_is_satisfied() {
        let mut config = DeployConfig::default();
        config.packages.clear();
        let ctx = StepContext::with_subsystems(
            config,
            PackageManager::None,
            ServiceManager::with_command("true"),
        );

        let status = PackagesStep.check(&ctx).await.unwrap();
        assert_eq!(status, StepStatus::Satisfied);

        let outcome = PackagesStep.apply(&ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_missing_manager_is_an_error() {
        let ctx = StepContext::with_subsystems(
            DeployConfig::default(),
            PackageManager::None,
            ServiceManager::with_command("true"),
        );

        assert!(PackagesStep.check(&ctx).await.is_err());
        assert!(PackagesStep.apply(&ctx).await.is_err());
    }
}
