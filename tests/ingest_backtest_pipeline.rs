//! End-to-end exercise of ingest -> store -> backtest against an in-memory
//! store/exchange pair, the way `drawdown_integration.rs` exercises the
//! risk pipeline against mock ports rather than a live broker.

use async_trait::async_trait;
use perpbot::application::backtest::run_backtest;
use perpbot::application::ingest::IngestEngine;
use perpbot::domain::candle::{Candle, RawCandle};
use perpbot::domain::ports::{CandleStore, ExchangeClient};
use perpbot::domain::strategy_config::StrategyConfig;
use perpbot::domain::time::{floor, RawTimestamp};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

const SYMBOL: &str = "BTC-PERPETUAL";

/// Serves a perfectly flat candle series for whatever window is requested,
/// regardless of timeframe.
struct FlatExchange;

#[async_trait]
impl ExchangeClient for FlatExchange {
    async fn fetch_candles(&self, _symbol: &str, timeframe_min: i64, start_ts: i64, end_ts: i64) -> anyhow::Result<Vec<RawCandle>> {
        let step_ms = timeframe_min * 60_000;
        let mut out = Vec::new();
        let mut ts = floor(start_ts, timeframe_min);
        while ts <= end_ts {
            out.push(RawCandle {
                ts: RawTimestamp::Number(ts),
                open: dec!(100),
                high: dec!(101),
                low: dec!(99),
                close: dec!(100),
                volume: dec!(10),
            });
            ts += step_ms;
        }
        Ok(out)
    }
}

#[derive(Default)]
struct InMemoryCandleStore {
    rows: Mutex<Vec<Candle>>,
}

#[async_trait]
impl CandleStore for InMemoryCandleStore {
    async fn upsert_many(&self, candles: &[Candle]) -> anyhow::Result<usize> {
        let mut rows = self.rows.lock().unwrap();
        for c in candles {
            match rows.iter_mut().find(|e| e.symbol == c.symbol && e.timeframe_min == c.timeframe_min && e.ts == c.ts) {
                Some(existing) => *existing = c.clone(),
                None => rows.push(c.clone()),
            }
        }
        Ok(candles.len())
    }

    async fn max_ts(&self, symbol: &str, timeframe_min: i64) -> anyhow::Result<Option<i64>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.symbol == symbol && c.timeframe_min == timeframe_min)
            .map(|c| c.ts)
            .max())
    }

    async fn range(&self, symbol: &str, timeframe_min: i64, start_ts: i64, end_ts: i64, limit: Option<usize>) -> anyhow::Result<Vec<Candle>> {
        let mut rows: Vec<Candle> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.symbol == symbol && c.timeframe_min == timeframe_min && c.ts >= start_ts && c.ts <= end_ts)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.ts);
        if let Some(l) = limit {
            rows.truncate(l);
        }
        Ok(rows)
    }
}

#[tokio::test]
async fn ingest_then_backtest_round_trip_is_idempotent_and_replays() {
    let exchange = Arc::new(FlatExchange);
    let store = Arc::new(InMemoryCandleStore::default());
    let engine = IngestEngine::new(exchange, store.clone(), SYMBOL.to_string(), "test".into(), 1000);

    let start_ts = 0i64;
    let end_ts = 300 * 60_000;

    for &tf in &[1i64, 5, 15, 60] {
        let first = engine.backfill(tf, start_ts, end_ts).await;
        assert!(!first.aborted);
        assert!(first.candles_upserted > 0, "timeframe {tf} should have ingested at least one candle");

        let second = engine.backfill(tf, start_ts, end_ts).await;
        assert_eq!(
            second.candles_upserted, first.candles_upserted,
            "repeat backfill over the same window must upsert the same rows, not grow the store"
        );
    }

    let (trades, metrics) = run_backtest(store.clone(), SYMBOL, 100 * 60_000, 199 * 60_000, &StrategyConfig::baseline())
        .await
        .expect("backtest should replay against the freshly ingested candles");

    assert!(trades.is_empty(), "a perfectly flat market never confirms a pivot, so no trend-following entry should fire");
    assert_eq!(metrics.trades, 0);
}

#[tokio::test]
async fn backtest_without_any_ingested_candles_errors_instead_of_silently_scoring_zero() {
    let store = Arc::new(InMemoryCandleStore::default());
    let result = run_backtest(store, SYMBOL, 0, 60_000, &StrategyConfig::baseline()).await;
    assert!(result.is_err(), "an empty store must surface as an error, not a zero-trade backtest");
}
