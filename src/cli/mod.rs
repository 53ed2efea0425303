//! Shared CLI plumbing used by `src/main.rs` and each `src/bin/*.rs`
//! entrypoint: tracing setup, cooperative shutdown, and metrics wiring
//! (spec §2 ambient stack "CLI entrypoints").

pub mod backtest;
pub mod ingest;
pub mod optimize;
pub mod paper;

use crate::infrastructure::observability::{Metrics, MetricsReporter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::prelude::*;

/// Installs a `tracing-subscriber` registry with an env-filter layer and a
/// pretty stdout layer, matching the teacher's `main.rs` startup sequence.
pub fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
}

/// A shared stop flag flipped on SIGTERM (or Ctrl-C), observed by every
/// cooperative loop in the process (spec §5 "Cancellation").
pub fn spawn_shutdown_watch() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    let _ = tx.send(true);
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        tracing::info!("shutdown signal received, stopping cooperatively");
        let _ = tx.send(true);
    });
    rx
}

/// Builds the metrics registry and spawns the push-based reporter task,
/// returning both so callers can increment counters and later join the
/// reporter against the same shutdown watch.
pub fn spawn_metrics_reporter(
    enabled: bool,
    interval_secs: u64,
    stop: watch::Receiver<bool>,
) -> (Arc<Metrics>, Option<tokio::task::JoinHandle<()>>) {
    let metrics = Arc::new(Metrics::new().expect("metrics registry must construct"));
    if !enabled {
        return (metrics, None);
    }
    let reporter = MetricsReporter::new((*metrics).clone(), Duration::from_secs(interval_secs));
    let handle = tokio::spawn(async move { reporter.run_until_stopped(stop).await });
    (metrics, Some(handle))
}

/// Parses a CLI date argument as either a bare `YYYY-MM-DD` date (midnight
/// UTC) or a full RFC-3339 timestamp, returning epoch-ms.
pub fn parse_cli_ts(raw: &str) -> anyhow::Result<i64> {
    use crate::domain::time::{normalize_ts, RawTimestamp};
    if raw.len() == 10 {
        return normalize_ts(&RawTimestamp::Iso(format!("{raw}T00:00:00Z")));
    }
    normalize_ts(&RawTimestamp::Iso(raw.to_string()))
}
