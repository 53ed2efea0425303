//! Event-driven historical replay engine (spec §4.H).

use crate::application::paper_engine::{check_exit, close_position};
use crate::application::state_builder::build_state;
use crate::application::strategy::{evaluate, StateCache};
use crate::domain::candle::Candle;
use crate::domain::errors::BacktestError;
use crate::domain::position::{Position, Side};
use crate::domain::ports::CandleStore;
use crate::domain::state::TimeframeState;
use crate::domain::strategy_config::StrategyConfig;
use crate::domain::trade::{Trade, TradeResult};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

pub const TIMEFRAMES: [i64; 4] = [1, 5, 15, 60];
const LOOKBACK_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metrics {
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

use serde::{Deserialize, Serialize};

/// One closed or forced-closed trade produced by a backtest run, kept
/// in-memory unless the caller persists it.
#[derive(Debug, Clone)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry: Decimal,
    pub exit: Decimal,
    pub size: Decimal,
    pub sl: Decimal,
    pub tp: Decimal,
    pub opened_at: i64,
    pub closed_at: i64,
    pub pnl_pct: f64,
    pub pnl_abs: Decimal,
    pub fees_abs: Decimal,
    pub exit_reason: &'static str,
}

struct TimeframeSeries {
    timeframe_min: i64,
    candles: Vec<Candle>,
    state: Option<TimeframeState>,
}

/// Loads candles per timeframe from `(start_ts - 24h)` to `end_ts` via the
/// store, then delegates to [`run_backtest_with_candles`]. The async
/// boundary is here and here only — the replay loop itself is pure CPU
/// work, which lets the optimizer preload once and fan the same data out
/// to many parallel (sync) backtests.
pub async fn run_backtest(
    store: Arc<dyn CandleStore>,
    symbol: &str,
    start_ts: i64,
    end_ts: i64,
    config: &StrategyConfig,
) -> anyhow::Result<(Vec<ClosedTrade>, Metrics)> {
    let lookback_start = start_ts - LOOKBACK_MS;
    let mut candles_by_tf = std::collections::HashMap::new();
    for &tf in TIMEFRAMES.iter() {
        let candles = store.range(symbol, tf, lookback_start, end_ts, None).await?;
        candles_by_tf.insert(tf, candles);
    }
    run_backtest_with_candles(symbol, start_ts, end_ts, config, &candles_by_tf)
}

/// Pure, synchronous replay over pre-loaded candles (one `Vec<Candle>` per
/// timeframe in `TIMEFRAMES`, each already covering `[start_ts - 24h,
/// end_ts]`). No I/O; safe to call from a `rayon` worker.
pub fn run_backtest_with_candles(
    symbol: &str,
    start_ts: i64,
    end_ts: i64,
    config: &StrategyConfig,
    candles_by_tf: &std::collections::HashMap<i64, Vec<Candle>>,
) -> anyhow::Result<(Vec<ClosedTrade>, Metrics)> {
    let mut series: Vec<TimeframeSeries> = TIMEFRAMES
        .iter()
        .map(|&tf| TimeframeSeries {
            timeframe_min: tf,
            candles: candles_by_tf.get(&tf).cloned().unwrap_or_default(),
            state: None,
        })
        .collect();

    let one_min_idx = 0usize;
    if series[one_min_idx].candles.is_empty() {
        anyhow::bail!(BacktestError::NoCandlesInRange);
    }

    // Seed state from lookback candles only (ts <= start_ts boundary handled below).
    for s in series.iter_mut() {
        let seed: Vec<Candle> = s.candles.iter().filter(|c| c.ts < start_ts).cloned().collect();
        if !seed.is_empty() {
            s.state = build_state(symbol, s.timeframe_min, &seed);
        }
    }

    let mut trades: Vec<ClosedTrade> = Vec::new();
    let mut open_position: Option<Position> = None;
    let mut equity = dec!(100);
    let mut equity_curve: Vec<Decimal> = vec![equity];
    let mut max_equity = equity;
    let mut max_dd_pct = 0.0f64;

    let one_min_candles: Vec<Candle> = series[one_min_idx]
        .candles
        .iter()
        .filter(|c| c.ts >= start_ts && c.ts <= end_ts)
        .cloned()
        .collect();

    for candle in &one_min_candles {
        refresh_states(&mut series, candle.ts, symbol);

        let state_1m = series[0].state.clone();
        let state_5m = series[1].state.clone();
        let state_15m = series[2].state.clone();
        let state_60m = series[3].state.clone();

        if let Some(mut pos) = open_position.take() {
            let exit = check_exit(&pos, candle);
            let timed_out = config.timeout_min > 0 && (candle.ts - pos.opened_at) / 60_000 >= config.timeout_min;
            if let Some((exit_px, reason)) = exit {
                let outcome = close_position(&pos, exit_px, config.taker_fee_bps, config.slippage_bps);
                record_trade(&mut trades, &pos, &outcome, candle.ts, reason);
                equity = compound_equity(equity, outcome.pnl_pct);
            } else if timed_out {
                let outcome = close_position(&pos, candle.close, config.taker_fee_bps, config.slippage_bps);
                record_trade(&mut trades, &pos, &outcome, candle.ts, "timeout");
                equity = compound_equity(equity, outcome.pnl_pct);
            } else {
                pos.update_excursion(candle.high, candle.low);
                open_position = Some(pos);
            }
        }

        if open_position.is_none() {
            let cache = StateCache {
                state_1m: state_1m.as_ref(),
                state_5m: state_5m.as_ref(),
                state_15m: state_15m.as_ref(),
                state_60m: state_60m.as_ref(),
            };
            if let Some(signal) = evaluate(&cache, candle, config) {
                if let Ok(pos) = crate::application::paper_engine::open_position(
                    signal.direction,
                    equity,
                    config.min_risk_pct.max(dec!(0.0001)),
                    signal.entry,
                    signal.sl,
                    signal.tp,
                    candle.ts,
                    config.taker_fee_bps,
                    config.slippage_bps,
                ) {
                    open_position = Some(pos);
                }
            }
        }

        equity_curve.push(equity);
        let update = crate::application::paper_engine::update_equity_and_dd(equity, max_equity);
        max_equity = update.max_equity;
        max_dd_pct = max_dd_pct.max(update.dd_pct);
    }

    if let Some(pos) = open_position.take() {
        let last_close = one_min_candles.last().map(|c| c.close).unwrap_or(pos.entry);
        let last_ts = one_min_candles.last().map(|c| c.ts).unwrap_or(end_ts);
        let outcome = close_position(&pos, last_close, config.taker_fee_bps, config.slippage_bps);
        record_trade(&mut trades, &pos, &outcome, last_ts, "timeout");
        equity = compound_equity(equity, outcome.pnl_pct);
        equity_curve.push(equity);
    }

    let metrics = compute_metrics(&trades, &equity_curve, max_dd_pct);
    Ok((trades, metrics))
}

fn refresh_states(series: &mut [TimeframeSeries], now_ts: i64, symbol: &str) {
    for s in series.iter_mut() {
        let is_base = s.timeframe_min == 1;
        let near_boundary = now_ts % (s.timeframe_min * 60_000) < 60_000;
        if !is_base && !near_boundary {
            continue;
        }
        let window: Vec<Candle> = s.candles.iter().filter(|c| c.ts <= now_ts).cloned().collect();
        if !window.is_empty() {
            s.state = build_state(symbol, s.timeframe_min, &window);
        }
    }
}

fn compound_equity(equity: Decimal, pnl_pct: f64) -> Decimal {
    let factor = Decimal::from_f64_retain(1.0 + pnl_pct / 100.0).unwrap_or(Decimal::ONE);
    equity * factor
}

fn record_trade(
    trades: &mut Vec<ClosedTrade>,
    pos: &Position,
    outcome: &crate::application::paper_engine::CloseOutcome,
    closed_at: i64,
    reason: &'static str,
) {
    trades.push(ClosedTrade {
        side: pos.side,
        entry: pos.entry,
        exit: outcome.fill_exit,
        size: pos.size,
        sl: pos.stop_loss,
        tp: pos.take_profit,
        opened_at: pos.opened_at,
        closed_at,
        pnl_pct: outcome.pnl_pct,
        pnl_abs: outcome.pnl_abs,
        fees_abs: outcome.total_fees,
        exit_reason: reason,
    });
}

fn compute_metrics(trades: &[ClosedTrade], equity_curve: &[Decimal], max_dd_pct: f64) -> Metrics {
    let n = trades.len();
    if n == 0 {
        return Metrics::default();
    }
    let wins: Vec<&ClosedTrade> = trades.iter().filter(|t| matches!(classify(t.pnl_pct), TradeResult::Win)).collect();
    let losses: Vec<&ClosedTrade> = trades.iter().filter(|t| matches!(classify(t.pnl_pct), TradeResult::Loss)).collect();
    let winrate = wins.len() as f64 / n as f64;

    let total_pnl_pct: f64 = trades.iter().map(|t| t.pnl_pct).sum();
    let avg_win: f64 = if wins.is_empty() { 0.0 } else { wins.iter().map(|t| t.pnl_pct).sum::<f64>() / wins.len() as f64 };
    let avg_loss: f64 = if losses.is_empty() { 0.0 } else { losses.iter().map(|t| t.pnl_pct).sum::<f64>() / losses.len() as f64 };
    let expectancy_pct = winrate * avg_win - (1.0 - winrate) * avg_loss.abs();

    let gross_gains: f64 = wins.iter().map(|t| t.pnl_pct.max(0.0)).sum();
    let gross_losses: f64 = losses.iter().map(|t| t.pnl_pct.abs()).sum();
    let profit_factor = if gross_losses > 0.0 { gross_gains / gross_losses } else { f64::INFINITY };

    let avg_duration_min = trades.iter().map(|t| (t.closed_at - t.opened_at) as f64 / 60_000.0).sum::<f64>() / n as f64;

    let max_dd = if equity_curve.is_empty() { max_dd_pct } else { max_drawdown_from_curve(equity_curve).max(max_dd_pct) };

    Metrics {
        trades: n,
        wins: wins.len(),
        losses: losses.len(),
        winrate: winrate * 100.0,
        total_pnl_pct,
        expectancy_pct,
        profit_factor,
        max_drawdown_pct: max_dd,
        avg_duration_min,
    }
}

fn classify(pnl_pct: f64) -> TradeResult {
    if pnl_pct > 0.01 {
        TradeResult::Win
    } else if pnl_pct < -0.01 {
        TradeResult::Loss
    } else {
        TradeResult::Breakeven
    }
}

fn max_drawdown_from_curve(curve: &[Decimal]) -> f64 {
    let mut peak = curve[0];
    let mut max_dd = 0.0f64;
    for &v in curve {
        if v > peak {
            peak = v;
        }
        if peak > Decimal::ZERO {
            let dd = ((peak - v) / peak * dec!(100)).to_f64().unwrap_or(0.0);
            max_dd = max_dd.max(dd);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy_config::StrategyConfig;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn flat_candle(ts: i64) -> Candle {
        Candle {
            symbol: "BTC-PERPETUAL".into(),
            timeframe_min: 1,
            ts,
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100),
            volume: dec!(1),
            source: "test".into(),
        }
    }

    fn flat_series(n: i64) -> HashMap<i64, Vec<Candle>> {
        let mut out = HashMap::new();
        for &tf in TIMEFRAMES.iter() {
            let candles: Vec<Candle> = (0..n)
                .map(|i| {
                    let mut c = flat_candle(i * 60_000);
                    c.timeframe_min = tf;
                    c
                })
                .collect();
            out.insert(tf, candles);
        }
        out
    }

    #[test]
    fn no_candles_in_range_errors() {
        let candles_by_tf = HashMap::new();
        let result = run_backtest_with_candles("BTC-PERPETUAL", 0, 60_000, &StrategyConfig::baseline(), &candles_by_tf);
        assert!(result.is_err());
    }

    #[test]
    fn flat_market_produces_zero_trades() {
        let candles_by_tf = flat_series(200);
        let (trades, metrics) = run_backtest_with_candles(
            "BTC-PERPETUAL",
            100 * 60_000,
            199 * 60_000,
            &StrategyConfig::baseline(),
            &candles_by_tf,
        )
        .unwrap();
        assert!(trades.is_empty());
        assert_eq!(metrics, Metrics::default());
    }

    #[test]
    fn replay_is_deterministic() {
        let candles_by_tf = flat_series(200);
        let config = StrategyConfig::baseline();
        let (_, m1) = run_backtest_with_candles("BTC-PERPETUAL", 100 * 60_000, 199 * 60_000, &config, &candles_by_tf).unwrap();
        let (_, m2) = run_backtest_with_candles("BTC-PERPETUAL", 100 * 60_000, 199 * 60_000, &config, &candles_by_tf).unwrap();
        assert_eq!(m1, m2);
    }

    #[test]
    fn to_persisted_trade_carries_fields() {
        let closed = ClosedTrade {
            side: Side::Long,
            entry: dec!(100),
            exit: dec!(105),
            size: dec!(1),
            sl: dec!(95),
            tp: dec!(110),
            opened_at: 0,
            closed_at: 60_000,
            pnl_pct: 5.0,
            pnl_abs: dec!(5),
            fees_abs: dec!(0.1),
            exit_reason: "sl_tp",
        };
        let run_id = Uuid::new_v4();
        let config_id = Uuid::new_v4();
        let persisted = to_persisted_trade(run_id, config_id, &closed);
        assert_eq!(persisted.run_id, run_id);
        assert_eq!(persisted.entry, dec!(100));
        assert_eq!(persisted.sl, dec!(95));
        assert_eq!(persisted.tp, dec!(110));
        assert_eq!(persisted.exit, Some(dec!(105)));
        assert_eq!(persisted.result, Some(TradeResult::Win));
    }
}

/// Builds a persistable `Trade` row from a `ClosedTrade`, for callers that
/// want to write the backtest's own trade ledger.
pub fn to_persisted_trade(run_id: Uuid, config_id: Uuid, t: &ClosedTrade) -> Trade {
    Trade {
        id: Uuid::new_v4(),
        run_id,
        config_id,
        opened_at: t.opened_at,
        side: t.side,
        entry: t.entry,
        size: t.size,
        sl: t.sl,
        tp: t.tp,
        closed_at: Some(t.closed_at),
        exit: Some(t.exit),
        pnl_pct: Some(t.pnl_pct),
        pnl_abs: Some(t.pnl_abs),
        fees_abs: Some(t.fees_abs),
        result: Some(classify(t.pnl_pct)),
        meta: serde_json::json!({ "exit_reason": t.exit_reason }),
    }
}
