use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};

/// Health probe errors
#[derive(Error, Debug)]
pub enum HealthError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type HealthResult<T> = Result<T, HealthError>;

/// Result of a bounded polling window
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub url: String,
    pub healthy: bool,
    pub attempts: u32,
    pub elapsed: Duration,
    /// What the last failed attempt saw (status line or transport error)
    pub last_error: Option<String>,
}

/// Bounded HTTP health polling.
///
/// Polls the endpoint until it answers 2xx or the window is exhausted.
/// The window bounds wall-clock time, not attempt count.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    url: String,
    window: Duration,
    interval: Duration,
    connect_timeout: Duration,
}

impl HealthProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            window: Duration::from_secs(30),
            interval: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Poll until healthy or the window closes.
    pub async fn wait_healthy(&self) -> HealthResult<HealthReport> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.connect_timeout.max(self.interval))
            .build()?;

        let started = Instant::now();
        let mut attempts = 0u32;
        let mut last_error = None;

        loop {
            attempts += 1;
            debug!(url = %self.url, attempts, "Health probe attempt");

            match client.get(&self.url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(url = %self.url, attempts, "Health check passed");
                    return Ok(HealthReport {
                        url: self.url.clone(),
                        healthy: true,
                        attempts,
                        elapsed: started.elapsed(),
                        last_error: None,
                    });
                }
                Ok(response) => {
                    last_error = Some(format!("HTTP {}", response.status()));
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }

            if started.elapsed() + self.interval >= self.window {
                return Ok(HealthReport {
                    url: self.url.clone(),
                    healthy: false,
                    attempts,
                    elapsed: started.elapsed(),
                    last_error,
                });
            }

            sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_unhealthy() {
        // Discard port: connection refused immediately, no listener.
        let probe = HealthProbe::new("http://127.0.0.1:9/health")
            .with_window(Duration::from_secs(1))
            .with_interval(Duration::from_millis(200))
            .with_connect_timeout(Duration::from_millis(200));

        let report = probe.wait_healthy().await.unwrap();
        assert!(!report.healthy);
        assert!(report.attempts >= 1);
        assert!(report.last_error.is_some());
    }

    #[tokio::test]
    async fn test_window_bounds_polling() {
        let window = Duration::from_secs(1);
        let probe = HealthProbe::new("http://127.0.0.1:9/health")
            .with_window(window)
            .with_interval(Duration::from_millis(100))
            .with_connect_timeout(Duration::from_millis(100));

        let started = Instant::now();
        let report = probe.wait_healthy().await.unwrap();
        // Bounded: the poll loop gives up within the window plus one
        // interval of slack.
        assert!(started.elapsed() < window + Duration::from_secs(1));
        assert!(report.elapsed <= started.elapsed());
    }

    #[test]
    fn test_builder_defaults() {
        let probe = HealthProbe::new("http://127.0.0.1:8080/health");
        assert_eq!(probe.url(), "http://127.0.0.1:8080/health");
        assert_eq!(probe.window, Duration::from_secs(30));
        assert_eq!(probe.interval, Duration::from_secs(2));
    }
}
