use crate::config::DeployConfig;
use crate::report::{RunReport, StepReport, StepRunStatus};
use crate::step::{Step, StepContext, StepOutcome, StepStatus};
use crate::steps::{
    accounts::AccountsStep, configs::ConfigsStep, layout::LayoutStep, packages::PackagesStep,
    preflight::PreflightStep, services::ServicesStep, verify::VerifyStep,
};
use chrono::Utc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// The canonical provisioning order. `verify` is the post-start health
/// gate; passing `verify = false` restores the old advisory-only behavior.
pub fn standard_sequence(config: &DeployConfig, verify: bool) -> Vec<Box<dyn Step>> {
    let mut steps: Vec<Box<dyn Step>> = vec![
        Box::new(PreflightStep),
        Box::new(AccountsStep),
        Box::new(LayoutStep),
        Box::new(PackagesStep),
        Box::new(ConfigsStep),
        Box::new(ServicesStep),
    ];

    if verify {
        steps.push(Box::new(VerifyStep::from_config(config)));
    }

    steps
}

/// Applies an ordered list of steps, aborting on the first failure.
///
/// No rollback is attempted: the sequence is fail-fast with no
/// compensation, and every step is individually idempotent, so the remedy
/// for a failed run is to fix the cause and re-run.
pub struct SequenceRunner {
    steps: Vec<Box<dyn Step>>,
}

impl SequenceRunner {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, ctx: &StepContext) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(self.steps.len());
        let mut failure: Option<String> = None;

        info!(
            %run_id,
            environment = %ctx.config.environment,
            dry_run = ctx.dry_run,
            "Starting provisioning run"
        );

        for step in &self.steps {
            if failure.is_some() {
                reports.push(StepReport {
                    name: step.name().to_string(),
                    status: StepRunStatus::Skipped,
                    detail: None,
                    duration_ms: 0,
                });
                continue;
            }

            let timer = Instant::now();
            let result = self.run_step(step.as_ref(), ctx).await;
            let duration_ms = timer.elapsed().as_millis() as u64;

            match result {
                Ok((status, detail)) => {
                    info!(step = step.name(), %status, duration_ms, "Step finished");
                    reports.push(StepReport {
                        name: step.name().to_string(),
                        status,
                        detail,
                        duration_ms,
                    });
                }
                Err(message) => {
                    error!(step = step.name(), error = %message, "Step failed; aborting run");
                    failure = Some(format!("{}: {}", step.name(), message));
                    reports.push(StepReport {
                        name: step.name().to_string(),
                        status: StepRunStatus::Failed,
                        detail: Some(message),
                        duration_ms,
                    });
                }
            }
        }

        RunReport {
            run_id,
            environment: ctx.config.environment.clone(),
            version: ctx.config.version.clone(),
            dry_run: ctx.dry_run,
            started_at,
            finished_at: Utc::now(),
            steps: reports,
            failure,
        }
    }

    async fn run_step(
        &self,
        step: &dyn Step,
        ctx: &StepContext,
    ) -> Result<(StepRunStatus, Option<String>), String> {
        let status = step.check(ctx).await.map_err(|e| e.to_string())?;

        match status {
            StepStatus::Satisfied => Ok((StepRunStatus::Unchanged, None)),
            StepStatus::Pending(reason) => {
                if ctx.dry_run {
                    return Ok((StepRunStatus::WouldChange, Some(reason)));
                }

                match step.apply(ctx).await.map_err(|e| e.to_string())? {
                    StepOutcome::Changed(detail) => {
                        Ok((StepRunStatus::Changed, Some(detail)))
                    }
                    StepOutcome::Unchanged => Ok((StepRunStatus::Unchanged, None)),
                }
            }
        }
    }
}
