use crate::health::{HealthError, HealthResult};
use futures::future::join_all;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

/// An ad-hoc request burst against a deployed endpoint.
///
/// Requests are fired in waves of `concurrency` tasks and joined before
/// the next wave starts, so at most `concurrency` requests are in flight
/// at once.
#[derive(Debug, Clone)]
pub struct LoadTest {
    pub url: String,
    pub requests: u32,
    pub concurrency: u32,
    pub timeout: Duration,
}

impl LoadTest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            requests: 20,
            concurrency: 5,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_requests(mut self, requests: u32) -> Self {
        self.requests = requests;
        self
    }

    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run(&self) -> HealthResult<LoadTestReport> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(HealthError::Client)?;

        let started = Instant::now();
        let mut outcomes: Vec<(bool, Duration)> = Vec::with_capacity(self.requests as usize);
        let mut remaining = self.requests;

        while remaining > 0 {
            let wave = remaining.min(self.concurrency.max(1));
            let futures = (0..wave).map(|_| {
                let client = client.clone();
                let url = self.url.clone();
                async move {
                    let timer = Instant::now();
                    let ok = client
                        .get(&url)
                        .send()
                        .await
                        .map(|r| r.status().is_success())
                        .unwrap_or(false);
                    (ok, timer.elapsed())
                }
            });

            outcomes.extend(join_all(futures).await);
            remaining -= wave;
        }

        let report = LoadTestReport::from_outcomes(&self.url, &outcomes, started.elapsed());
        info!(
            url = %self.url,
            succeeded = report.succeeded,
            failed = report.failed,
            "Load test finished"
        );
        Ok(report)
    }
}

/// Aggregate result of a load test
#[derive(Debug, Clone, Serialize)]
pub struct LoadTestReport {
    pub url: String,
    pub requests: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub min_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    pub elapsed_ms: u64,
}

impl LoadTestReport {
    fn from_outcomes(url: &str, outcomes: &[(bool, Duration)], elapsed: Duration) -> Self {
        let succeeded = outcomes.iter().filter(|(ok, _)| *ok).count() as u32;
        let latencies: Vec<f64> = outcomes
            .iter()
            .map(|(_, d)| d.as_secs_f64() * 1000.0)
            .collect();

        let (min, max, avg) = if latencies.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let min = latencies.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = latencies.iter().cloned().fold(0.0_f64, f64::max);
            let avg = latencies.iter().sum::<f64>() / latencies.len() as f64;
            (min, max, avg)
        };

        Self {
            url: url.to_string(),
            requests: outcomes.len() as u32,
            succeeded,
            failed: outcomes.len() as u32 - succeeded,
            min_latency_ms: min,
            avg_latency_ms: avg,
            max_latency_ms: max,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Human-readable one-screen summary.
    pub fn render_text(&self) -> String {
        format!(
            "{}: {}/{} succeeded in {}ms (latency min {:.1}ms / avg {:.1}ms / max {:.1}ms)",
            self.url,
            self.succeeded,
            self.requests,
            self.elapsed_ms,
            self.min_latency_ms,
            self.avg_latency_ms,
            self.max_latency_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_requests_are_accounted_for() {
        // Discard port refuses immediately; every request fails fast.
        let test = LoadTest::new("http://127.0.0.1:9/")
            .with_requests(8)
            .with_concurrency(3);

        let report = test.run().await.unwrap();
        assert_eq!(report.requests, 8);
        assert_eq!(report.succeeded + report.failed, 8);
        assert_eq!(report.succeeded, 0);
    }

    #[tokio::test]
    async fn test_zero_requests_is_an_empty_report() {
        let test = LoadTest::new("http://127.0.0.1:9/").with_requests(0);
        let report = test.run().await.unwrap();
        assert_eq!(report.requests, 0);
        assert_eq!(report.avg_latency_ms, 0.0);
    }

    #[test]
    fn test_concurrency_floor_is_one() {
        let test = LoadTest::new("http://127.0.0.1:9/").with_concurrency(0);
        assert_eq!(test.concurrency, 1);
    }

    #[test]
    fn test_report_stats() {
        let outcomes = vec![
            (true, Duration::from_millis(10)),
            (true, Duration::from_millis(30)),
            (false, Duration::from_millis(20)),
        ];
        let report =
            LoadTestReport::from_outcomes("http://x/", &outcomes, Duration::from_millis(60));
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!((report.min_latency_ms - 10.0).abs() < 1.0);
        assert!((report.max_latency_ms - 30.0).abs() < 1.0);
        assert!((report.avg_latency_ms - 20.0).abs() < 1.0);
    }

    #[test]
    fn test_render_text() {
        let report = LoadTestReport::from_outcomes(
            "http://x/",
            &[(true, Duration::from_millis(5))],
            Duration::from_millis(5),
        );
        let text = report.render_text();
        assert!(text.contains("1/1 succeeded"));
    }
}
