//! Push-based metrics reporter: periodically renders the registry as
//! structured JSON and logs it at `info!`, matching the teacher's
//! "outbound data only, no HTTP server" observability design.

use crate::infrastructure::observability::metrics::Metrics;
use prometheus::Encoder;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::info;

#[derive(Serialize)]
struct MetricFamily {
    name: String,
    metric_type: String,
    samples: Vec<MetricSample>,
}

#[derive(Serialize)]
struct MetricSample {
    labels: std::collections::BTreeMap<String, String>,
    value: f64,
}

#[derive(Serialize)]
struct MetricsSnapshot {
    uptime_seconds: u64,
    families: Vec<MetricFamily>,
}

/// Periodically logs a JSON snapshot of `metrics` until `stop` fires.
pub struct MetricsReporter {
    metrics: Metrics,
    interval: Duration,
    start_time: Instant,
}

impl MetricsReporter {
    pub fn new(metrics: Metrics, interval: Duration) -> Self {
        Self { metrics, interval, start_time: Instant::now() }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let families = self
            .metrics
            .registry()
            .gather()
            .into_iter()
            .map(|mf| {
                let samples = mf
                    .get_metric()
                    .iter()
                    .map(|m| {
                        let labels = m
                            .get_label()
                            .iter()
                            .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
                            .collect();
                        let value = if m.has_counter() {
                            m.get_counter().get_value()
                        } else if m.has_gauge() {
                            m.get_gauge().get_value()
                        } else {
                            0.0
                        };
                        MetricSample { labels, value }
                    })
                    .collect();
                MetricFamily {
                    name: mf.get_name().to_string(),
                    metric_type: format!("{:?}", mf.get_field_type()),
                    samples,
                }
            })
            .collect();

        MetricsSnapshot { uptime_seconds: self.start_time.elapsed().as_secs(), families }
    }

    /// Also encodes the registry in Prometheus text exposition format, for
    /// callers that scrape logs rather than an HTTP endpoint.
    pub fn encode_text(&self) -> anyhow::Result<String> {
        let encoder = prometheus::TextEncoder::new();
        let families = self.metrics.registry().gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Runs until `stop` is set, logging a snapshot every `interval`.
    pub async fn run_until_stopped(&self, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow() {
                break;
            }
            match serde_json::to_string(&self.snapshot()) {
                Ok(json) => info!(target: "perpbot::metrics", metrics = %json, "metrics snapshot"),
                Err(e) => tracing::warn!(error = %e, "failed to serialize metrics snapshot"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_nonempty_text_exposition() {
        let metrics = Metrics::new().unwrap();
        metrics.optimizer_runs_total.set(3.0);
        let reporter = MetricsReporter::new(metrics, Duration::from_secs(60));
        let text = reporter.encode_text().unwrap();
        assert!(text.contains("perpbot_optimizer_runs_total"));
    }
}
