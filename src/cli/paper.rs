//! `paper` entrypoint: resumes or starts a paper-trade run and polls until
//! stopped (spec §4.J).

use crate::application::paper_runner::{PaperRunner, RunnerConfig};
use crate::config::{CoreEnvConfig, PaperEnvConfig};
use crate::infrastructure::notifications::{NullNotifier, WebhookNotifier};
use crate::domain::ports::{Notifier, PaperStore};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::{SqliteCandleStore, SqliteOptimizerStore, SqlitePaperStore, SqliteTradeStore};
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Args, Default)]
pub struct PaperArgs {
    /// Overrides the `SYMBOL` env var for this run.
    #[arg(long)]
    pub symbol: Option<String>,
}

pub async fn run(args: PaperArgs, stop: watch::Receiver<bool>, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let core = CoreEnvConfig::from_env()?;
    let paper_env = PaperEnvConfig::from_env()?;
    let symbol = args.symbol.unwrap_or_else(|| std::env::var("SYMBOL").unwrap_or_else(|_| "BTC-PERPETUAL".to_string()));

    let db = Database::new(&core.database_url).await?;
    let candle_store = Arc::new(SqliteCandleStore::new(db.pool.clone()));
    let paper_store = Arc::new(SqlitePaperStore::new(db.pool.clone()));
    let trade_store = Arc::new(SqliteTradeStore::new(db.pool.clone()));
    let optimizer_store = Arc::new(SqliteOptimizerStore::new(db.pool.clone()));
    let notifier: Arc<dyn Notifier> = match &paper_env.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NullNotifier),
    };

    let optimizer_run_id = paper_env
        .optimizer_run_id
        .ok_or_else(|| anyhow::anyhow!("PAPER_OPTIMIZER_RUN_ID is required to start or resume a paper run"))?;

    let runner_config = RunnerConfig {
        symbol,
        top_n: paper_env.top_n,
        balance_start: paper_env.balance_start,
        poll_seconds: paper_env.poll_seconds,
        safe_lag_min: paper_env.safe_lag_min,
        min_trades_before_kill: paper_env.min_trades_before_kill,
        kill_max_dd_pct: paper_env.kill_max_dd_pct,
        kill_min_pf: paper_env.kill_min_pf,
        kill_min_pnl_pct: paper_env.kill_min_pnl_pct,
    }
    .clamp_safe_lag();

    let metrics_sink: Arc<dyn crate::domain::ports::PaperMetricsSink> = metrics.clone();
    let runner = PaperRunner::new(candle_store, paper_store.clone(), trade_store, optimizer_store, notifier, Some(metrics_sink), runner_config);
    let run_id = runner.initialize(paper_env.run_id, optimizer_run_id).await?;
    let active = paper_store.list_active_accounts(run_id).await?.len();
    metrics.paper_active_accounts.set(active as f64);
    info!(run_id = %run_id, optimizer_run_id = %optimizer_run_id, accounts = active, "paper run initialized, entering poll loop");
    runner.run_until_stopped(run_id, stop).await?;
    info!(run_id = %run_id, "paper run stopped");
    Ok(())
}
