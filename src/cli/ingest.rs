//! `ingest` entrypoint: backfill a historical range or poll continuously
//! (spec §4.D).

use crate::application::ingest::IngestEngine;
use crate::config::{CoreEnvConfig, IngestEnvConfig};
use crate::infrastructure::exchange::http_exchange::HttpExchangeClient;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::SqliteCandleStore;
use chrono::Utc;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Args, Default)]
pub struct IngestArgs {
    /// Overrides the `SYMBOL` env var for this run.
    #[arg(long)]
    pub symbol: Option<String>,
}

pub async fn run(args: IngestArgs, stop: watch::Receiver<bool>, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let core = CoreEnvConfig::from_env()?;
    let ingest_cfg = IngestEnvConfig::from_env()?;
    let symbol = args.symbol.unwrap_or(ingest_cfg.symbol.clone());

    if ingest_cfg.dry_run {
        info!(symbol, timeframes = ?ingest_cfg.timeframes, "DRY_RUN set, exiting without touching the store");
        return Ok(());
    }

    let db = Database::new(&core.database_url).await?;
    let store = Arc::new(SqliteCandleStore::new(db.pool.clone()));
    let exchange = Arc::new(HttpExchangeClient::new(core.exchange_base_url.clone()));
    let engine = IngestEngine::new(exchange, store, symbol.clone(), core.source.clone(), core.batch_limit);

    if ingest_cfg.backfill {
        let start = ingest_cfg.backfill_start_ts.expect("validated by IngestEnvConfig::from_env");
        let end = ingest_cfg.backfill_end_ts.expect("validated by IngestEnvConfig::from_env");
        for &tf in &ingest_cfg.timeframes {
            let report = engine.backfill(tf, start, end).await;
            let tf_label = tf.to_string();
            metrics
                .candles_ingested_total
                .with_label_values(&[symbol.as_str(), tf_label.as_str()])
                .inc_by(report.candles_upserted as f64);
            metrics
                .ingest_pages_total
                .with_label_values(&[symbol.as_str(), tf_label.as_str()])
                .inc_by(report.pages_fetched as f64);
            if report.aborted {
                metrics
                    .ingest_timeframe_aborts_total
                    .with_label_values(&[symbol.as_str(), tf_label.as_str()])
                    .inc();
            }
            info!(
                timeframe_min = tf,
                candles = report.candles_upserted,
                pages = report.pages_fetched,
                aborted = report.aborted,
                "backfill complete"
            );
        }
        return Ok(());
    }

    info!(symbol, timeframes = ?ingest_cfg.timeframes, poll_seconds = ingest_cfg.poll_seconds, "starting continuous ingest");
    let mut stop = stop;
    loop {
        if *stop.borrow() {
            break;
        }
        let now_ms = Utc::now().timestamp_millis();
        for &tf in &ingest_cfg.timeframes {
            let tf_label = tf.to_string();
            match engine.poll_once(tf, now_ms).await {
                Some(report) if report.aborted => {
                    metrics
                        .ingest_timeframe_aborts_total
                        .with_label_values(&[symbol.as_str(), tf_label.as_str()])
                        .inc();
                    warn!(timeframe_min = tf, "poll aborted early")
                }
                Some(report) => {
                    metrics
                        .candles_ingested_total
                        .with_label_values(&[symbol.as_str(), tf_label.as_str()])
                        .inc_by(report.candles_upserted as f64);
                    metrics
                        .ingest_pages_total
                        .with_label_values(&[symbol.as_str(), tf_label.as_str()])
                        .inc_by(report.pages_fetched as f64);
                    info!(timeframe_min = tf, candles = report.candles_upserted, "poll caught up")
                }
                None => {}
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(ingest_cfg.poll_seconds)) => {}
            _ = stop.changed() => {}
        }
    }
    info!("ingest stopped");
    Ok(())
}
