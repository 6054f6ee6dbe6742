use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use uuid::Uuid;

/// How a step ended up in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRunStatus {
    /// Host state was mutated
    Changed,
    /// Desired state already held; nothing was done
    Unchanged,
    /// Dry-run: the step reported pending work it did not perform
    WouldChange,
    /// The step failed and aborted the run
    Failed,
    /// Never reached because an earlier step failed
    Skipped,
}

impl std::fmt::Display for StepRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepRunStatus::Changed => write!(f, "changed"),
            StepRunStatus::Unchanged => write!(f, "unchanged"),
            StepRunStatus::WouldChange => write!(f, "would change"),
            StepRunStatus::Failed => write!(f, "FAILED"),
            StepRunStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Record for one step in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub status: StepRunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub duration_ms: u64,
}

/// Summary of an entire provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub environment: String,
    pub version: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl RunReport {
    /// True only when every step ran and none failed.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
            && self
                .steps
                .iter()
                .all(|s| !matches!(s.status, StepRunStatus::Failed | StepRunStatus::Skipped))
    }

    /// Steps that mutated (or would mutate) the host.
    pub fn changed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| {
                matches!(
                    s.status,
                    StepRunStatus::Changed | StepRunStatus::WouldChange
                )
            })
            .count()
    }

    /// Human-readable summary, the replacement for the banner the old
    /// provisioning scripts printed at the end of a run.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { " (dry run)" } else { "" };

        let _ = writeln!(
            out,
            "Provisioning run {} — {} {}{}",
            self.run_id, self.environment, self.version, mode
        );
        let _ = writeln!(
            out,
            "Started {}, finished {}",
            self.started_at.to_rfc3339(),
            self.finished_at.to_rfc3339()
        );
        let _ = writeln!(out);

        for step in &self.steps {
            let detail = step
                .detail
                .as_deref()
                .map(|d| format!(" — {d}"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {:<12} {:>12}  {:>6}ms{}",
                step.name, step.status, step.duration_ms, detail
            );
        }

        let _ = writeln!(out);
        match &self.failure {
            Some(failure) => {
                let _ = writeln!(out, "Result: FAILED — {failure}");
            }
            None => {
                let _ = writeln!(
                    out,
                    "Result: ok — {} of {} steps made changes",
                    self.changed_count(),
                    self.steps.len()
                );
            }
        }

        out
    }

    /// JSON rendering for machine consumers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
