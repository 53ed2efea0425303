//! Grid-search optimizer (spec §4.I): runs the pruned config grid over a
//! training window, drawdown-filters and ranks results, re-validates the
//! top survivors out-of-sample, and persists each stage independently.

use crate::application::backtest::{run_backtest_with_candles, Metrics, TIMEFRAMES};
use crate::application::optimizer::grid::{generate, ParameterGrid};
use crate::domain::candle::Candle;
use crate::domain::errors::OptimizerError;
use crate::domain::optimizer_run::{AllConfigResult, BacktestMetrics, OosResult, OptimizerRun, TopConfig};
use crate::domain::ports::{CandleStore, OptimizerStore};
use crate::domain::strategy_config::StrategyConfig;
use crate::domain::time::end_of_day;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_DD_LIMIT: f64 = 10.0;
const DEFAULT_OOS_DAYS: i64 = 7;
const DEFAULT_OOS_TOP_N: usize = 3;
const ONE_DAY_MS: i64 = 24 * 60 * 60 * 1000;
const ONE_MIN_MS: i64 = 60_000;

pub struct OptimizerConfig {
    pub symbol: String,
    pub train_start_ts: i64,
    pub train_end_ts: i64,
    pub dd_limit_pct: f64,
    pub oos_top_n: usize,
    pub oos_start_ts: Option<i64>,
    pub oos_end_ts: Option<i64>,
    pub save_all_configs: bool,
}

impl OptimizerConfig {
    pub fn new(symbol: String, train_start_ts: i64, train_end_ts: i64) -> Self {
        Self {
            symbol,
            train_start_ts,
            train_end_ts,
            dd_limit_pct: DEFAULT_DD_LIMIT,
            oos_top_n: DEFAULT_OOS_TOP_N,
            oos_start_ts: None,
            oos_end_ts: None,
            save_all_configs: false,
        }
    }
}

struct Scored {
    config: StrategyConfig,
    metrics: Option<Metrics>,
    score: f64,
}

fn score_of(metrics: &Metrics, dd_limit_pct: f64) -> f64 {
    if metrics.max_drawdown_pct > dd_limit_pct {
        f64::NEG_INFINITY
    } else {
        metrics.expectancy_pct + (metrics.profit_factor / 10.0).min(0.5)
    }
}

fn to_backtest_metrics(m: &Metrics) -> BacktestMetrics {
    BacktestMetrics {
        trades: m.trades,
        wins: m.wins,
        losses: m.losses,
        winrate: m.winrate,
        total_pnl_pct: m.total_pnl_pct,
        expectancy_pct: m.expectancy_pct,
        profit_factor: m.profit_factor,
        max_drawdown_pct: m.max_drawdown_pct,
        avg_duration_min: m.avg_duration_min,
    }
}

/// Runs the full grid over `[config.train_start_ts, config.train_end_ts]`,
/// ranks survivors, re-validates the top N out-of-sample, and persists every
/// stage. Candles for the training (and, if derived, OOS) window are loaded
/// once up front; each backtest itself is pure and runs on a `rayon` worker.
pub async fn run_optimization(
    candle_store: Arc<dyn CandleStore>,
    optimizer_store: Arc<dyn OptimizerStore>,
    grid: &ParameterGrid,
    config: &OptimizerConfig,
) -> anyhow::Result<Uuid> {
    let configs = generate(grid);
    if configs.is_empty() {
        anyhow::bail!(OptimizerError::GridEmpty);
    }

    let run_id = Uuid::new_v4();
    let run = OptimizerRun {
        id: run_id,
        symbol: config.symbol.clone(),
        train_start_ts: config.train_start_ts,
        train_end_ts: config.train_end_ts,
        dd_limit_pct: config.dd_limit_pct,
        total_configs: configs.len(),
        valid_configs: 0,
    };
    optimizer_store.create_run(&run).await?;

    let train_candles = load_candles(
        &candle_store,
        &config.symbol,
        config.train_start_ts - ONE_DAY_MS,
        config.train_end_ts,
    )
    .await?;

    let scored: Vec<Scored> = configs
        .into_par_iter()
        .map(|cfg| {
            match run_backtest_with_candles(
                &config.symbol,
                config.train_start_ts,
                config.train_end_ts,
                &cfg,
                &train_candles,
            ) {
                Ok((_, metrics)) => {
                    let score = score_of(&metrics, config.dd_limit_pct);
                    Scored { config: cfg, metrics: Some(metrics), score }
                }
                Err(e) => {
                    warn!(error = %e, "config backtest failed, scoring -inf");
                    Scored { config: cfg, metrics: None, score: f64::NEG_INFINITY }
                }
            }
        })
        .collect();

    let valid_configs = scored.iter().filter(|s| s.score.is_finite()).count();
    if let Err(e) = optimizer_store.patch_run_counts(run_id, scored.len(), valid_configs).await {
        warn!(error = %e, "failed to patch optimizer run counts");
    }

    let mut ranked: Vec<&Scored> = scored.iter().filter(|s| s.score.is_finite()).collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let top: Vec<&Scored> = ranked.into_iter().take(10).collect();

    let top_rows: Vec<TopConfig> = top
        .iter()
        .enumerate()
        .map(|(i, s)| TopConfig {
            run_id,
            rank: (i + 1) as i32,
            score: s.score,
            config: s.config.clone(),
            metrics: to_backtest_metrics(s.metrics.as_ref().expect("finite score implies metrics")),
        })
        .collect();
    if let Err(e) = optimizer_store.save_top_configs(&top_rows).await {
        warn!(error = %e, "failed to save top configs");
    }

    if config.save_all_configs {
        let all_rows: Vec<AllConfigResult> = scored
            .iter()
            .map(|s| AllConfigResult {
                run_id,
                config: s.config.clone(),
                score: s.score,
                metrics: s.metrics.as_ref().map(to_backtest_metrics),
            })
            .collect();
        if let Err(e) = optimizer_store.save_all_configs(&all_rows).await {
            warn!(error = %e, "failed to save all-config results");
        }
    }

    let oos_n = config.oos_top_n.min(top_rows.len());
    if oos_n > 0 {
        let (oos_start, oos_end) = oos_window(config);
        let oos_candles = load_candles(&candle_store, &config.symbol, oos_start - ONE_DAY_MS, oos_end).await?;

        let oos_rows: Vec<OosResult> = top_rows[..oos_n]
            .par_iter()
            .filter_map(|row| {
                let result = run_backtest_with_candles(&config.symbol, oos_start, oos_end, &row.config, &oos_candles);
                match result {
                    Ok((_, metrics)) => {
                        let stability_warning = metrics.total_pnl_pct < 0.0 || metrics.max_drawdown_pct > row.metrics.max_drawdown_pct;
                        Some(OosResult {
                            run_id,
                            rank: row.rank,
                            symbol: config.symbol.clone(),
                            window_start_ts: oos_start,
                            window_end_ts: oos_end,
                            metrics: to_backtest_metrics(&metrics),
                            stability_warning,
                        })
                    }
                    Err(e) => {
                        warn!(rank = row.rank, error = %e, "OOS backtest failed, skipping");
                        None
                    }
                }
            })
            .collect();

        for row in &oos_rows {
            if row.stability_warning {
                warn!(rank = row.rank, "OOS stability warning: pnl negative or drawdown exceeded in-sample");
            }
        }

        if let Err(e) = optimizer_store.save_oos_results(&oos_rows).await {
            warn!(error = %e, "failed to save OOS results");
        }
    }

    info!(run_id = %run_id, total = scored.len(), valid = valid_configs, top = top_rows.len(), "optimizer run complete");
    Ok(run_id)
}

fn oos_window(config: &OptimizerConfig) -> (i64, i64) {
    match (config.oos_start_ts, config.oos_end_ts) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            let start = config.train_end_ts + ONE_MIN_MS;
            let end = end_of_day(config.train_end_ts + DEFAULT_OOS_DAYS * ONE_DAY_MS);
            (start, end)
        }
    }
}

async fn load_candles(
    store: &Arc<dyn CandleStore>,
    symbol: &str,
    start_ts: i64,
    end_ts: i64,
) -> anyhow::Result<HashMap<i64, Vec<Candle>>> {
    let mut out = HashMap::new();
    for &tf in TIMEFRAMES.iter() {
        let candles = store.range(symbol, tf, start_ts, end_ts, None).await?;
        out.insert(tf, candles);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(expectancy: f64, pf: f64, dd: f64) -> Metrics {
        Metrics {
            trades: 10,
            wins: 6,
            losses: 4,
            winrate: 60.0,
            total_pnl_pct: expectancy * 10.0,
            expectancy_pct: expectancy,
            profit_factor: pf,
            max_drawdown_pct: dd,
            avg_duration_min: 30.0,
        }
    }

    #[test]
    fn scenario_6_bonus_cap_flips_ranking() {
        let m1 = metrics(1.0, 2.0, 5.0);
        let m2 = metrics(0.9, 10.0, 5.0);
        let m3 = metrics(1.1, 1.0, 15.0);

        let s1 = score_of(&m1, 10.0);
        let s2 = score_of(&m2, 10.0);
        let s3 = score_of(&m3, 10.0);

        assert_eq!(s3, f64::NEG_INFINITY);
        assert!((s1 - 1.2).abs() < 1e-9);
        assert!((s2 - 1.4).abs() < 1e-9);
        assert!(s2 > s1);
    }
}
