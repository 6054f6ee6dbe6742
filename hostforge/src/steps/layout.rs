use crate::step::{Step, StepContext, StepOutcome, StepResult, StepStatus};
use async_trait::async_trait;
use hostops::{is_root, user_exists, Cmd};
use std::path::PathBuf;
use tracing::debug;

/// Subdirectories created under the install root
const SUBDIRS: &[&str] = &["bin", "config", "log", "data", "payload"];

/// Creates the install directory tree and hands it to the service user.
pub struct LayoutStep;

impl LayoutStep {
    fn dirs(ctx: &StepContext) -> Vec<PathBuf> {
        SUBDIRS
            .iter()
            .map(|sub| ctx.config.install_root.join(sub))
            .collect()
    }

    /// Ownership can only be applied when running as root and the service
    /// user already exists; otherwise the tree is left as created.
    fn chown_tree(ctx: &StepContext) -> StepResult<()> {
        if !is_root()? || !user_exists(&ctx.config.service_user) {
            debug!("Skipping ownership change");
            return Ok(());
        }

        Cmd::new("chown")
            .arg("-R")
            .arg(format!(
                "{}:{}",
                ctx.config.service_user, ctx.config.service_group
            ))
            .arg(ctx.config.install_root.display().to_string())
            .run()?;
        Ok(())
    }
}

#[async_trait]
impl Step for LayoutStep {
    fn name(&self) -> &str {
        "layout"
    }

    async fn check(&self, ctx: &StepContext) -> StepResult<StepStatus> {
        let missing: Vec<String> = Self::dirs(ctx)
            .iter()
            .filter(|dir| !dir.is_dir())
            .map(|dir| dir.display().to_string())
            .collect();

        if missing.is_empty() {
            Ok(StepStatus::Satisfied)
        } else {
            Ok(StepStatus::Pending(format!(
                "missing directories: {}",
                missing.join(", ")
            )))
        }
    }

    async fn apply(&self, ctx: &StepContext) -> StepResult<StepOutcome> {
        let mut created = 0usize;
        for dir in Self::dirs(ctx) {
            if !dir.is_dir() {
                std::fs::create_dir_all(&dir)?;
                created += 1;
            }
        }

        Self::chown_tree(ctx)?;

        if created == 0 {
            Ok(StepOutcome::Unchanged)
        } else {
            Ok(StepOutcome::Changed(format!(
                "created {created} directories under {}",
                ctx.config.install_root.display()
            )))
        }
    }
}
