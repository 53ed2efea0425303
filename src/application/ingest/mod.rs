//! Ingest engine (spec §4.D): keeps the candle store at-or-behind the most
//! recent closed candle on each configured timeframe, in backfill or
//! continuous mode.

use crate::domain::candle::{normalize_candle, RawCandle};
use crate::domain::ports::{CandleStore, ExchangeClient};
use crate::domain::time::{add_minutes, floor};
use std::sync::Arc;
use tracing::{info, warn};

/// A fetch window is capped at 7 days or `batch_limit * timeframe_min`
/// minutes, whichever is smaller (spec §4.D).
const MAX_WINDOW_DAYS_MS: i64 = 7 * 24 * 60 * 60 * 1000;
const MAX_PAGES: u32 = 1000;

pub struct IngestEngine {
    exchange: Arc<dyn ExchangeClient>,
    store: Arc<dyn CandleStore>,
    symbol: String,
    source: String,
    batch_limit: i64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TimeframeIngestReport {
    pub candles_upserted: usize,
    pub pages_fetched: u32,
    pub aborted: bool,
}

impl IngestEngine {
    pub fn new(exchange: Arc<dyn ExchangeClient>, store: Arc<dyn CandleStore>, symbol: String, source: String, batch_limit: i64) -> Self {
        Self { exchange, store, symbol, source, batch_limit }
    }

    /// Backfill mode: caller supplies an explicit range, fetched and
    /// upserted page by page until the range is exhausted.
    pub async fn backfill(&self, timeframe_min: i64, start_ts: i64, end_ts: i64) -> TimeframeIngestReport {
        let start = floor(start_ts, timeframe_min);
        let end = floor(end_ts, timeframe_min);
        self.page_and_upsert(timeframe_min, start, end).await
    }

    /// Continuous mode: advances the store up to the last closed boundary
    /// for `timeframe_min`. Returns `None` (no report) if already caught up.
    pub async fn poll_once(&self, timeframe_min: i64, now_ms: i64) -> Option<TimeframeIngestReport> {
        let end_safe = floor(now_ms, timeframe_min) - timeframe_min * 60_000;
        let max_stored = match self.store.max_ts(&self.symbol, timeframe_min).await {
            Ok(v) => v,
            Err(e) => {
                warn!(timeframe_min, error = %e, "failed to read max stored candle ts");
                return Some(TimeframeIngestReport { aborted: true, ..Default::default() });
            }
        };
        let start = match max_stored {
            Some(ts) => add_minutes(ts, timeframe_min),
            None => floor(now_ms - 24 * 60 * 60 * 1000, timeframe_min),
        };
        if start >= end_safe {
            return None;
        }
        Some(self.page_and_upsert(timeframe_min, start, end_safe).await)
    }

    async fn page_and_upsert(&self, timeframe_min: i64, start_ts: i64, end_ts: i64) -> TimeframeIngestReport {
        let mut report = TimeframeIngestReport::default();
        let mut cursor = start_ts;
        let window_ms = MAX_WINDOW_DAYS_MS.min(self.batch_limit * timeframe_min * 60_000);

        while cursor < end_ts {
            if report.pages_fetched >= MAX_PAGES {
                warn!(timeframe_min, "aborting timeframe after {MAX_PAGES} pages");
                report.aborted = true;
                break;
            }
            let window_end = (cursor + window_ms).min(end_ts);
            report.pages_fetched += 1;

            match self.exchange.fetch_candles(&self.symbol, timeframe_min, cursor, window_end).await {
                Ok(raw) => {
                    if raw.is_empty() {
                        info!(timeframe_min, cursor, "no data for window, advancing cursor");
                        cursor = window_end + timeframe_min * 60_000;
                        continue;
                    }
                    let mut last_ts = cursor;
                    let mut valid: Vec<_> = Vec::with_capacity(raw.len());
                    for r in raw {
                        match normalize_candle_checked(r, &self.symbol, timeframe_min, &self.source) {
                            Some(c) => {
                                last_ts = last_ts.max(c.ts);
                                valid.push(c);
                            }
                            None => warn!(timeframe_min, "dropped invalid candle"),
                        }
                    }
                    if let Err(e) = self.store.upsert_many(&valid).await {
                        warn!(timeframe_min, error = %e, "upsert failed, advancing cursor by one window");
                        cursor = window_end + timeframe_min * 60_000;
                        continue;
                    }
                    report.candles_upserted += valid.len();
                    cursor = add_minutes(last_ts, timeframe_min);
                }
                Err(e) => {
                    warn!(timeframe_min, error = %e, "fetch failed, advancing cursor by one window");
                    cursor = window_end + timeframe_min * 60_000;
                }
            }
        }
        report
    }
}

fn normalize_candle_checked(raw: RawCandle, symbol: &str, timeframe_min: i64, source: &str) -> Option<crate::domain::candle::Candle> {
    normalize_candle(raw, symbol, timeframe_min, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Candle;
    use crate::domain::time::RawTimestamp;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct MockExchange {
        batches: Mutex<Vec<Vec<RawCandle>>>,
    }

    #[async_trait]
    impl ExchangeClient for MockExchange {
        async fn fetch_candles(&self, _symbol: &str, _tf: i64, _start: i64, _end: i64) -> anyhow::Result<Vec<RawCandle>> {
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                Ok(vec![])
            } else {
                Ok(batches.remove(0))
            }
        }
    }

    #[derive(Default)]
    struct MockStore {
        candles: Mutex<Vec<Candle>>,
    }

    #[async_trait]
    impl CandleStore for MockStore {
        async fn upsert_many(&self, candles: &[Candle]) -> anyhow::Result<usize> {
            let mut store = self.candles.lock().unwrap();
            for c in candles {
                if let Some(existing) = store.iter_mut().find(|e| e.symbol == c.symbol && e.timeframe_min == c.timeframe_min && e.ts == c.ts) {
                    *existing = c.clone();
                } else {
                    store.push(c.clone());
                }
            }
            Ok(candles.len())
        }

        async fn max_ts(&self, _symbol: &str, _tf: i64) -> anyhow::Result<Option<i64>> {
            Ok(self.candles.lock().unwrap().iter().map(|c| c.ts).max())
        }

        async fn range(&self, _symbol: &str, _tf: i64, start: i64, end: i64, _limit: Option<usize>) -> anyhow::Result<Vec<Candle>> {
            let mut rows: Vec<_> = self
                .candles
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.ts >= start && c.ts <= end)
                .cloned()
                .collect();
            rows.sort_by_key(|c| c.ts);
            Ok(rows)
        }
    }

    const BASE: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z

    fn raw_at(ts: i64) -> RawCandle {
        RawCandle {
            ts: RawTimestamp::Number(ts),
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100.5),
            volume: dec!(10),
        }
    }

    #[tokio::test]
    async fn backfill_upserts_idempotently() {
        let exchange = Arc::new(MockExchange {
            batches: Mutex::new(vec![vec![raw_at(BASE), raw_at(BASE + 60_000)]]),
        });
        let store = Arc::new(MockStore::default());
        let engine = IngestEngine::new(exchange, store.clone(), "BTC-PERPETUAL".into(), "test".into(), 500);
        let report = engine.backfill(1, BASE, BASE + 120_000).await;
        assert_eq!(report.candles_upserted, 2);
        assert_eq!(store.candles.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn repeat_backfill_inserts_zero_new_rows() {
        let exchange = Arc::new(MockExchange {
            batches: Mutex::new(vec![vec![raw_at(BASE)], vec![raw_at(BASE)]]),
        });
        let store = Arc::new(MockStore::default());
        let engine = IngestEngine::new(exchange, store.clone(), "BTC-PERPETUAL".into(), "test".into(), 500);
        engine.backfill(1, BASE, BASE + 60_000).await;
        engine.backfill(1, BASE, BASE + 60_000).await;
        assert_eq!(store.candles.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_data_response_advances_cursor() {
        let exchange = Arc::new(MockExchange { batches: Mutex::new(vec![vec![]]) });
        let store = Arc::new(MockStore::default());
        let engine = IngestEngine::new(exchange, store, "BTC-PERPETUAL".into(), "test".into(), 500);
        let report = engine.backfill(1, BASE, BASE + 60_000).await;
        assert_eq!(report.candles_upserted, 0);
        assert!(!report.aborted);
    }
}
