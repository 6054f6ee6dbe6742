use crate::step::{Step, StepContext, StepOutcome, StepResult, StepStatus};
use async_trait::async_trait;
use hostops::{ensure_system_user, group_exists, user_exists, Ensured, SystemUserSpec};

/// Ensures the service group and system user exist.
pub struct AccountsStep;

impl AccountsStep {
    fn spec(ctx: &StepContext) -> SystemUserSpec {
        SystemUserSpec::new(&ctx.config.service_user, &ctx.config.service_group)
            .with_home(&ctx.config.install_root)
    }
}

#[async_trait]
impl Step for AccountsStep {
    fn name(&self) -> &str {
        "accounts"
    }

    async fn check(&self, ctx: &StepContext) -> StepResult<StepStatus> {
        let user = &ctx.config.service_user;
        let group = &ctx.config.service_group;

        match (user_exists(user), group_exists(group)) {
            (true, true) => Ok(StepStatus::Satisfied),
            (false, _) => Ok(StepStatus::Pending(format!("user '{user}' missing"))),
            (_, false) => Ok(StepStatus::Pending(format!("group '{group}' missing"))),
        }
    }

    async fn apply(&self, ctx: &StepContext) -> StepResult<StepOutcome> {
        let spec = Self::spec(ctx);
        match ensure_system_user(&spec)? {
            Ensured::Created => Ok(StepOutcome::Changed(format!(
                "created system user '{}'",
                spec.name
            ))),
            Ensured::AlreadyPresent => Ok(StepOutcome::Unchanged),
        }
    }
}
