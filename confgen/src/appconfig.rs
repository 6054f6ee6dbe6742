use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// App config rendering errors
#[derive(Error, Debug)]
pub enum AppConfigError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Tuning knobs that go into the deployed application's config, minus the
/// values only known at render time (timestamp, secrets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfigSpec {
    pub environment: String,
    pub version: String,
    pub worker_count: u32,
    pub request_timeout_secs: u64,
    pub cache_size_mb: u64,
    pub log_level: String,
    /// Environment variable the API key is read from at render time
    pub api_key_env: Option<String>,
}

impl Default for AppConfigSpec {
    fn default() -> Self {
        Self {
            environment: "production".to_string(),
            version: "0.1.0".to_string(),
            worker_count: 4,
            request_timeout_secs: 30,
            cache_size_mb: 256,
            log_level: "info".to_string(),
            api_key_env: None,
        }
    }
}

/// The runtime configuration file the deployed services read.
///
/// Built as a typed struct and serialized with serde_json, so the file is
/// valid JSON by construction and `deployed_at` is a real timestamp rather
/// than whatever text a template happened to contain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub version: String,
    pub deployed_at: DateTime<Utc>,
    pub worker_count: u32,
    pub request_timeout_secs: u64,
    pub cache_size_mb: u64,
    pub log_level: String,
    /// Resolved secret; null when the configured env var is unset
    pub api_key: Option<String>,
}

impl AppConfig {
    /// Build the config from its spec, resolving the API key from the
    /// process environment. An unset variable renders as `null`.
    pub fn from_spec(spec: &AppConfigSpec, deployed_at: DateTime<Utc>) -> Self {
        let api_key = spec.api_key_env.as_ref().and_then(|var| {
            let value = std::env::var(var).ok();
            if value.is_none() {
                warn!(var, "API key variable unset; rendering null");
            }
            value
        });

        Self {
            environment: spec.environment.clone(),
            version: spec.version.clone(),
            deployed_at,
            worker_count: spec.worker_count,
            request_timeout_secs: spec.request_timeout_secs,
            cache_size_mb: spec.cache_size_mb,
            log_level: spec.log_level.clone(),
            api_key,
        }
    }

    /// Render as pretty-printed JSON with a trailing newline.
    pub fn render(&self) -> Result<String, AppConfigError> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_render_is_valid_json() {
        let config = AppConfig::from_spec(&AppConfigSpec::default(), Utc::now());
        let rendered = config.render().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["environment"], "production");
        assert_eq!(parsed["worker_count"], 4);
    }

    #[test]
    fn test_deployed_at_is_a_real_timestamp() {
        let now = Utc::now();
        let config = AppConfig::from_spec(&AppConfigSpec::default(), now);
        let rendered = config.render().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        let text = parsed["deployed_at"].as_str().unwrap();
        let round_trip: DateTime<Utc> = text.parse().unwrap();
        assert_eq!(round_trip, now);
        assert!(!text.contains('$'));
    }

    #[test]
    #[serial]
    fn test_api_key_null_when_env_unset() {
        std::env::remove_var("CONFGEN_TEST_API_KEY");
        let spec = AppConfigSpec {
            api_key_env: Some("CONFGEN_TEST_API_KEY".to_string()),
            ..AppConfigSpec::default()
        };
        let config = AppConfig::from_spec(&spec, Utc::now());
        assert!(config.api_key.is_none());

        let parsed: serde_json::Value =
            serde_json::from_str(&config.render().unwrap()).unwrap();
        assert!(parsed["api_key"].is_null());
    }

    #[test]
    #[serial]
    fn test_api_key_resolved_from_env() {
        std::env::set_var("CONFGEN_TEST_API_KEY", "sk-test-123");
        let spec = AppConfigSpec {
            api_key_env: Some("CONFGEN_TEST_API_KEY".to_string()),
            ..AppConfigSpec::default()
        };
        let config = AppConfig::from_spec(&spec, Utc::now());
        assert_eq!(config.api_key.as_deref(), Some("sk-test-123"));
        std::env::remove_var("CONFGEN_TEST_API_KEY");
    }

    #[test]
    fn test_spec_serde_round_trip() {
        let spec = AppConfigSpec::default();
        let json = serde_json::to_string(&spec).unwrap();
        let back: AppConfigSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.environment, spec.environment);
        assert_eq!(back.worker_count, spec.worker_count);
    }
}
