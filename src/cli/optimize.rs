//! `optimize` entrypoint: grid-search a training window, persist ranked and
//! out-of-sample results (spec §4.I).

use crate::application::optimizer::{generate, load_grid_from_toml, run_optimization, OptimizerConfig, ParameterGrid};
use crate::cli::parse_cli_ts;
use crate::config::{CoreEnvConfig, OptimizerEnvConfig};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::{SqliteCandleStore, SqliteOptimizerStore};
use clap::Args;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Args)]
pub struct OptimizeArgs {
    /// Instrument symbol, defaults to `SYMBOL` env var or `BTC-PERPETUAL`.
    #[arg(long)]
    pub symbol: Option<String>,

    /// Training window start, `YYYY-MM-DD` or RFC-3339.
    #[arg(long)]
    pub train_start: String,

    /// Training window end, `YYYY-MM-DD` or RFC-3339.
    #[arg(long)]
    pub train_end: String,

    /// Path to a TOML file overriding the default parameter grid.
    #[arg(long)]
    pub grid_config: Option<String>,
}

pub async fn run(args: OptimizeArgs, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let core = CoreEnvConfig::from_env()?;
    let opt_env = OptimizerEnvConfig::from_env()?;
    let symbol = args.symbol.unwrap_or_else(|| std::env::var("SYMBOL").unwrap_or_else(|_| "BTC-PERPETUAL".to_string()));
    let train_start_ts = parse_cli_ts(&args.train_start)?;
    let train_end_ts = parse_cli_ts(&args.train_end)?;

    let grid: ParameterGrid = match args.grid_config {
        Some(path) => load_grid_from_toml(&path)?,
        None => ParameterGrid::default(),
    };
    let grid_size = generate(&grid).len();
    info!(configs = grid_size, "parameter grid prepared");

    let db = Database::new(&core.database_url).await?;
    let candle_store = Arc::new(SqliteCandleStore::new(db.pool.clone()));
    let optimizer_store = Arc::new(SqliteOptimizerStore::new(db.pool.clone()));

    let mut config = OptimizerConfig::new(symbol, train_start_ts, train_end_ts);
    config.dd_limit_pct = opt_env.dd_limit_pct;
    config.oos_top_n = opt_env.oos_top_n;
    config.oos_start_ts = opt_env.oos_start_ts;
    config.oos_end_ts = opt_env.oos_end_ts;
    config.save_all_configs = opt_env.save_all_configs;

    let run_id = match run_optimization(candle_store, optimizer_store, &grid, &config).await {
        Ok(id) => {
            metrics.optimizer_configs_scored_total.with_label_values(&["ok"]).inc_by(grid_size as f64);
            metrics.optimizer_runs_total.inc();
            id
        }
        Err(e) => {
            metrics.optimizer_configs_scored_total.with_label_values(&["errored"]).inc_by(grid_size as f64);
            return Err(e);
        }
    };
    info!(run_id = %run_id, "optimizer run persisted");
    Ok(())
}
