//! `backtest` entrypoint: one ad-hoc historical replay over an explicit
//! window, using either the baseline strategy config or one loaded from a
//! JSON file (spec §4.H).

use crate::application::backtest::run_backtest;
use crate::cli::parse_cli_ts;
use crate::config::CoreEnvConfig;
use crate::domain::strategy_config::StrategyConfig;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::SqliteCandleStore;
use anyhow::Context;
use clap::Args;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Args)]
pub struct BacktestArgs {
    /// Instrument symbol, defaults to `SYMBOL` env var or `BTC-PERPETUAL`.
    #[arg(long)]
    pub symbol: Option<String>,

    /// Window start, `YYYY-MM-DD` or RFC-3339.
    #[arg(long)]
    pub start: String,

    /// Window end, `YYYY-MM-DD` or RFC-3339.
    #[arg(long)]
    pub end: String,

    /// Path to a JSON-encoded `StrategyConfig` override; baseline() if omitted.
    #[arg(long)]
    pub config: Option<String>,
}

pub async fn run(args: BacktestArgs, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let core = CoreEnvConfig::from_env()?;
    let symbol = args.symbol.unwrap_or_else(|| std::env::var("SYMBOL").unwrap_or_else(|_| "BTC-PERPETUAL".to_string()));
    let start_ts = parse_cli_ts(&args.start)?;
    let end_ts = parse_cli_ts(&args.end)?;

    let strategy_config = match args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("failed to read strategy config '{path}'"))?;
            serde_json::from_str::<StrategyConfig>(&raw).with_context(|| format!("failed to parse strategy config '{path}'"))?
        }
        None => StrategyConfig::baseline(),
    };

    let db = Database::new(&core.database_url).await?;
    let store = Arc::new(SqliteCandleStore::new(db.pool.clone()));

    let outcome = run_backtest(store, &symbol, start_ts, end_ts, &strategy_config).await;
    let (trades, bt_metrics) = match outcome {
        Ok(v) => {
            metrics.backtests_run_total.with_label_values(&["ok"]).inc();
            v
        }
        Err(e) => {
            metrics.backtests_run_total.with_label_values(&["errored"]).inc();
            return Err(e);
        }
    };

    info!(
        symbol,
        start = args.start,
        end = args.end,
        trades = bt_metrics.trades,
        wins = bt_metrics.wins,
        losses = bt_metrics.losses,
        winrate_pct = bt_metrics.winrate,
        expectancy_pct = bt_metrics.expectancy_pct,
        profit_factor = bt_metrics.profit_factor,
        max_drawdown_pct = bt_metrics.max_drawdown_pct,
        avg_duration_min = bt_metrics.avg_duration_min,
        "backtest complete"
    );
    for t in &trades {
        tracing::debug!(
            side = ?t.side,
            entry = %t.entry,
            exit = %t.exit,
            pnl_pct = t.pnl_pct,
            reason = t.exit_reason,
            "closed trade"
        );
    }
    Ok(())
}
