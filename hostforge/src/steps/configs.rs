use crate::config::DeployConfig;
use crate::step::{Step, StepContext, StepOutcome, StepResult, StepStatus};
use async_trait::async_trait;
use chrono::Utc;
use confgen::{AppConfig, AppConfigSpec, SiteConfig, UnitSpec, Upstream};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Renders and writes the deployment artifacts: the proxy site file, one
/// unit file per service, and the application's runtime JSON config.
pub struct ConfigsStep;

/// A rendered artifact and where it belongs on the host
struct Artifact {
    path: PathBuf,
    contents: String,
}

fn site_config(config: &DeployConfig) -> SiteConfig {
    let mut site = SiteConfig::new(&config.proxy.server_name, config.proxy.listen_port)
        .with_health_path(&config.health.path);

    for service in &config.services {
        if let Some(port) = service.port {
            site = site.with_upstream(Upstream::new(&service.name, port));
        }
    }

    site
}

fn unit_spec(config: &DeployConfig, index: usize) -> UnitSpec {
    let service = &config.services[index];
    UnitSpec::new(&service.name, &service.description, &service.exec_start)
        .with_user(&config.service_user, &config.service_group)
        .with_working_dir(&config.install_root)
}

fn app_config_spec(config: &DeployConfig) -> AppConfigSpec {
    AppConfigSpec {
        environment: config.environment.clone(),
        version: config.version.clone(),
        worker_count: config.app.worker_count,
        request_timeout_secs: config.app.request_timeout_secs,
        cache_size_mb: config.app.cache_size_mb,
        log_level: config.app.log_level.clone(),
        api_key_env: config.app.api_key_env.clone(),
    }
}

/// Render every artifact for inspection without touching the host: the
/// proxy site, one unit per service, and the app config. Keyed by the
/// file name each would be installed under.
pub fn render_all(config: &DeployConfig) -> StepResult<Vec<(String, String)>> {
    let mut rendered = vec![(
        config
            .nginx_site
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stack.conf".to_string()),
        site_config(config).render(),
    )];

    for index in 0..config.services.len() {
        let unit = unit_spec(config, index);
        rendered.push((unit.file_name(), unit.render()));
    }

    let app = AppConfig::from_spec(&app_config_spec(config), Utc::now()).render()?;
    rendered.push(("app.json".to_string(), app));

    Ok(rendered)
}

impl ConfigsStep {
    /// Everything except the app config, which embeds a render-time
    /// timestamp and is handled separately for idempotence checks.
    fn static_artifacts(config: &DeployConfig) -> Vec<Artifact> {
        let mut artifacts = vec![Artifact {
            path: config.nginx_site.clone(),
            contents: site_config(config).render(),
        }];

        for index in 0..config.services.len() {
            let unit = unit_spec(config, index);
            artifacts.push(Artifact {
                path: config.unit_dir.join(unit.file_name()),
                contents: unit.render(),
            });
        }

        artifacts
    }

    fn app_config_path(config: &DeployConfig) -> PathBuf {
        config.install_root.join("config").join("app.json")
    }

    /// The app config is converged when it exists and matches the spec in
    /// everything but `deployed_at` and the resolved secret.
    fn app_config_current(config: &DeployConfig) -> bool {
        let path = Self::app_config_path(config);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return false;
        };
        let Ok(existing) = serde_json::from_str::<AppConfig>(&text) else {
            return false;
        };

        let spec = app_config_spec(config);
        existing.environment == spec.environment
            && existing.version == spec.version
            && existing.worker_count == spec.worker_count
            && existing.request_timeout_secs == spec.request_timeout_secs
            && existing.cache_size_mb == spec.cache_size_mb
            && existing.log_level == spec.log_level
    }

    fn write_artifact(path: &Path, contents: &str) -> StepResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[async_trait]
impl Step for ConfigsStep {
    fn name(&self) -> &str {
        "configs"
    }

    async fn check(&self, ctx: &StepContext) -> StepResult<StepStatus> {
        let stale: Vec<String> = Self::static_artifacts(&ctx.config)
            .iter()
            .filter(|a| std::fs::read_to_string(&a.path).ok().as_deref() != Some(&a.contents))
            .map(|a| a.path.display().to_string())
            .collect();

        let app_current = Self::app_config_current(&ctx.config);

        if stale.is_empty() && app_current {
            Ok(StepStatus::Satisfied)
        } else {
            let mut out_of_date = stale;
            if !app_current {
                out_of_date.push(Self::app_config_path(&ctx.config).display().to_string());
            }
            Ok(StepStatus::Pending(format!(
                "artifacts out of date: {}",
                out_of_date.join(", ")
            )))
        }
    }

    async fn apply(&self, ctx: &StepContext) -> StepResult<StepOutcome> {
        let mut written = 0usize;

        for artifact in Self::static_artifacts(&ctx.config) {
            let current = std::fs::read_to_string(&artifact.path).ok();
            if current.as_deref() == Some(artifact.contents.as_str()) {
                debug!(path = %artifact.path.display(), "Artifact already current");
                continue;
            }
            Self::write_artifact(&artifact.path, &artifact.contents)?;
            written += 1;
        }

        if !Self::app_config_current(&ctx.config) {
            let spec = app_config_spec(&ctx.config);
            let rendered = AppConfig::from_spec(&spec, Utc::now()).render()?;
            Self::write_artifact(&Self::app_config_path(&ctx.config), &rendered)?;
            written += 1;
        }

        if written == 0 {
            Ok(StepOutcome::Unchanged)
        } else {
            Ok(StepOutcome::Changed(format!("wrote {written} artifacts")))
        }
    }
}
