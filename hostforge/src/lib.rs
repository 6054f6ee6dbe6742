pub mod config;
pub mod deploy;
pub mod health;
pub mod loadtest;
pub mod report;
pub mod runner;
pub mod step;
pub mod steps;

pub use config::{
    AppTuning, ConfigError, DeployConfig, HealthConfig, PreflightConfig, ProxyConfig, ServiceSpec,
};
pub use deploy::{DeployError, DeployPlan, DeployResult};
pub use health::{HealthError, HealthProbe, HealthReport};
pub use loadtest::{LoadTest, LoadTestReport};
pub use report::{RunReport, StepReport, StepRunStatus};
pub use runner::{standard_sequence, SequenceRunner};
pub use steps::configs::render_all;
pub use step::{Step, StepContext, StepError, StepOutcome, StepResult, StepStatus};
