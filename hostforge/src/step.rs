use crate::config::DeployConfig;
use async_trait::async_trait;
use confgen::AppConfigError;
use hostops::{
    AccountError, ExecError, FactsError, PackageManager, PkgError, ServiceManager, SvcError,
};
use thiserror::Error;

/// Errors a provisioning step can raise
#[derive(Error, Debug)]
pub enum StepError {
    /// A hard precondition failed; there is nothing the step could mutate
    /// to fix it
    #[error("Precondition not satisfied: {reason}")]
    Unsatisfied { reason: String },

    /// Post-start verification failed
    #[error("Health verification failed: {reason}")]
    Verification { reason: String },

    /// Package operation failed
    #[error("Package operation failed: {0}")]
    Pkg(#[from] PkgError),

    /// Service operation failed
    #[error("Service operation failed: {0}")]
    Svc(#[from] SvcError),

    /// Account operation failed
    #[error("Account operation failed: {0}")]
    Account(#[from] AccountError),

    /// Host inspection failed
    #[error("Host inspection failed: {0}")]
    Facts(#[from] FactsError),

    /// Artifact rendering failed
    #[error("Artifact rendering failed: {0}")]
    Render(#[from] AppConfigError),

    /// Command execution failed
    #[error("Command execution failed: {0}")]
    Exec(#[from] ExecError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StepResult<T> = Result<T, StepError>;

/// What a precondition probe found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The desired end-state already holds; apply would be a no-op
    Satisfied,
    /// Work remains; the reason says what
    Pending(String),
}

/// What applying a step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Host state was mutated
    Changed(String),
    /// The desired state already held
    Unchanged,
}

/// Shared state handed to every step.
pub struct StepContext {
    pub config: DeployConfig,
    pub pkg: PackageManager,
    pub svc: ServiceManager,
    pub dry_run: bool,
}

impl StepContext {
    /// Context against the live host subsystems.
    pub fn new(config: DeployConfig) -> Self {
        Self {
            config,
            pkg: PackageManager::detect(),
            svc: ServiceManager::new(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Context with injected subsystems, for tests and stubs.
    pub fn with_subsystems(config: DeployConfig, pkg: PackageManager, svc: ServiceManager) -> Self {
        Self {
            config,
            pkg,
            svc,
            dry_run: false,
        }
    }
}

/// One idempotent provisioning step.
///
/// `check` probes whether the desired end-state already holds; `apply`
/// converges the host onto it. The runner never calls `apply` when `check`
/// reported [`StepStatus::Satisfied`], and a second run of a converged
/// sequence therefore performs no mutating work.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, ctx: &StepContext) -> StepResult<StepStatus>;

    async fn apply(&self, ctx: &StepContext) -> StepResult<StepOutcome>;
}
