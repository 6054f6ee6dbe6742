use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One service the sequence installs and manages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Unit name without the `.service` suffix
    pub name: String,
    pub description: String,
    pub exec_start: String,
    /// Local port the service listens on; daemons without an HTTP surface
    /// leave this unset and are not routed through the proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Reverse-proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub server_name: String,
    pub listen_port: u16,
    /// Unit name of the proxy itself
    pub unit: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            server_name: "stack.local".to_string(),
            listen_port: 80,
            unit: "nginx".to_string(),
        }
    }
}

/// Health verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub path: String,
    /// Port probed directly (the API service, not the proxy)
    pub port: u16,
    pub window_secs: u64,
    pub interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            port: 8080,
            window_secs: 30,
            interval_secs: 2,
        }
    }
}

/// Resource thresholds checked before anything is mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightConfig {
    pub min_disk_mb: u64,
    pub min_memory_mb: u64,
    pub require_root: bool,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            min_disk_mb: 1024,
            min_memory_mb: 512,
            require_root: true,
        }
    }
}

/// Tuning knobs forwarded into the rendered application config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppTuning {
    pub worker_count: u32,
    pub request_timeout_secs: u64,
    pub cache_size_mb: u64,
    pub log_level: String,
    /// Environment variable the API key is resolved from at render time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Default for AppTuning {
    fn default() -> Self {
        Self {
            worker_count: 4,
            request_timeout_secs: 30,
            cache_size_mb: 256,
            log_level: "info".to_string(),
            api_key_env: None,
        }
    }
}

/// The full declarative input to a provisioning run.
///
/// Every knob the deployment takes lives here, loaded from one TOML file;
/// nothing is read from ambient shell variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub environment: String,
    pub version: String,
    pub install_root: PathBuf,
    /// Where unit files are written
    pub unit_dir: PathBuf,
    /// Where the rendered proxy site file is written
    pub nginx_site: PathBuf,
    pub service_user: String,
    pub service_group: String,
    pub packages: Vec<String>,
    pub services: Vec<ServiceSpec>,
    pub proxy: ProxyConfig,
    pub health: HealthConfig,
    pub preflight: PreflightConfig,
    pub app: AppTuning,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            environment: "production".to_string(),
            version: "0.1.0".to_string(),
            install_root: PathBuf::from("/opt/stack"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            nginx_site: PathBuf::from("/etc/nginx/conf.d/stack.conf"),
            service_user: "stack".to_string(),
            service_group: "stack".to_string(),
            packages: vec![
                "nginx".to_string(),
                "curl".to_string(),
                "python3".to_string(),
            ],
            services: vec![
                ServiceSpec {
                    name: "stack-api".to_string(),
                    description: "Stack HTTP API server".to_string(),
                    exec_start: "/opt/stack/bin/stack-api --config /opt/stack/config/app.json"
                        .to_string(),
                    port: Some(8080),
                },
                ServiceSpec {
                    name: "stack-orchestrator".to_string(),
                    description: "Stack background orchestrator".to_string(),
                    exec_start:
                        "/opt/stack/bin/stack-orchestrator --config /opt/stack/config/app.json"
                            .to_string(),
                    port: None,
                },
            ],
            proxy: ProxyConfig::default(),
            health: HealthConfig::default(),
            preflight: PreflightConfig::default(),
            app: AppTuning::default(),
        }
    }
}

impl DeployConfig {
    /// Load and validate a config file.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: DeployConfig =
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_install_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.install_root = root.into();
        self
    }

    /// Unit names of every managed service, proxy included.
    pub fn managed_units(&self) -> Vec<String> {
        let mut units: Vec<String> = self
            .services
            .iter()
            .map(|s| format!("{}.service", s.name))
            .collect();
        units.push(self.proxy.unit.clone());
        units
    }

    /// URL the health verification step probes.
    pub fn health_url(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.health.port, self.health.path)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let fail = |message: String| Err(ConfigError::Invalid { message });

        if self.environment.is_empty() {
            return fail("environment cannot be empty".to_string());
        }

        if self.services.is_empty() {
            return fail("at least one service must be configured".to_string());
        }

        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                return fail("service names cannot be empty".to_string());
            }
            if !names.insert(&service.name) {
                return fail(format!("duplicate service name '{}'", service.name));
            }
            if let Some(port) = service.port {
                if !ports.insert(port) {
                    return fail(format!("duplicate service port {port}"));
                }
                if port == self.proxy.listen_port {
                    return fail(format!(
                        "service port {port} collides with the proxy listen port"
                    ));
                }
            }
        }

        if !self.services.iter().any(|s| s.port == Some(self.health.port)) {
            return fail(format!(
                "health port {} does not belong to any configured service",
                self.health.port
            ));
        }

        if self.health.window_secs == 0 {
            return fail("health polling window must be non-zero".to_string());
        }

        if self.health.interval_secs == 0 {
            return fail("health polling interval must be non-zero".to_string());
        }

        if !self.health.path.starts_with('/') {
            return fail(format!(
                "health path '{}' must start with '/'",
                self.health.path
            ));
        }

        if self.service_user.is_empty() || self.service_group.is_empty() {
            return fail("service user and group cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DeployConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.services.len(), 2);
    }

    #[test]
    fn test_managed_units_include_proxy() {
        let units = DeployConfig::default().managed_units();
        assert_eq!(
            units,
            vec![
                "stack-api.service".to_string(),
                "stack-orchestrator.service".to_string(),
                "nginx".to_string()
            ]
        );
    }

    #[test]
    fn test_health_url() {
        let config = DeployConfig::default();
        assert_eq!(config.health_url(), "http://127.0.0.1:8080/health");
    }

    #[test]
    fn test_validation_rejects_empty_services() {
        let mut config = DeployConfig::default();
        config.services.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_duplicate_ports() {
        let mut config = DeployConfig::default();
        config.services[1].port = Some(8080);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_names() {
        let mut config = DeployConfig::default();
        config.services[1].name = "stack-api".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_proxy_port_collision() {
        let mut config = DeployConfig::default();
        config.proxy.listen_port = 8080;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_orphan_health_port() {
        let mut config = DeployConfig::default();
        config.health.port = 9999;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_polling_window() {
        let mut config = DeployConfig::default();
        config.health.window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_relative_health_path() {
        let mut config = DeployConfig::default();
        config.health.path = "health".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path_with_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.toml");
        std::fs::write(
            &path,
            r#"
environment = "staging"
version = "1.2.3"

[health]
path = "/health"
port = 8080
window_secs = 10
interval_secs = 1
"#,
        )
        .unwrap();

        let config = DeployConfig::from_path(&path).unwrap();
        assert_eq!(config.environment, "staging");
        assert_eq!(config.version, "1.2.3");
        // Unspecified sections fall back to defaults
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.health.window_secs, 10);
    }

    #[test]
    fn test_from_path_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.toml");
        std::fs::write(&path, "environment = [not toml").unwrap();
        assert!(matches!(
            DeployConfig::from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(matches!(
            DeployConfig::from_path(Path::new("/no/such/deploy.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = DeployConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: DeployConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.environment, config.environment);
        assert_eq!(back.services.len(), config.services.len());
        assert!(back.validate().is_ok());
    }
}
