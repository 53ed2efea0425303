//! Optimizer run aggregates and children (spec §3 "Optimizer Run").

use crate::domain::strategy_config::StrategyConfig;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerRun {
    pub id: Uuid,
    pub symbol: String,
    pub train_start_ts: i64,
    pub train_end_ts: i64,
    pub dd_limit_pct: f64,
    pub total_configs: usize,
    pub valid_configs: usize,
}

/// In-sample backtest metrics for one configuration (see
/// `application::backtest::Metrics`), flattened for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub winrate: f64,
    pub total_pnl_pct: f64,
    pub expectancy_pct: f64,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub avg_duration_min: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopConfig {
    pub run_id: Uuid,
    pub rank: i32,
    pub score: f64,
    pub config: StrategyConfig,
    pub metrics: BacktestMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllConfigResult {
    pub run_id: Uuid,
    pub config: StrategyConfig,
    pub score: f64,
    pub metrics: Option<BacktestMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OosResult {
    pub run_id: Uuid,
    pub rank: i32,
    pub symbol: String,
    pub window_start_ts: i64,
    pub window_end_ts: i64,
    pub metrics: BacktestMetrics,
    pub stability_warning: bool,
}
