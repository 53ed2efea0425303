//! The immutable OHLCV observation at the bottom of the whole system.

use crate::domain::time::{floor, normalize_ts, RawTimestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const MIN_VALID_YEAR: i32 = 2009;
pub const MAX_VALID_YEAR: i32 = 2100;

/// An immutable observation: `(symbol, timeframe_min, ts)` is unique and
/// `ts` is always floor-aligned to `timeframe_min`. Written exclusively by
/// the ingest engine; read by the state builder, backtest engine, and
/// paper-trade runner; never mutated once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe_min: i64,
    pub ts: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub source: String,
}

impl Candle {
    /// True range against the previous candle's close.
    pub fn true_range(&self, prev_close: Decimal) -> Decimal {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn is_ts_aligned(&self) -> bool {
        floor(self.ts, self.timeframe_min) == self.ts
    }
}

/// A candle as received from the exchange adapter, before year-range
/// validation and timeframe-boundary alignment.
#[derive(Debug, Clone)]
pub struct RawCandle {
    pub ts: RawTimestamp,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Normalizes and validates a raw candle into a store-ready `Candle`.
/// Returns `None` (with the caller expected to log a warning) when the
/// candle's year falls outside `[2009, 2100]` or the timestamp can't be
/// parsed — dropped, never an error that aborts the batch (spec §4.D, §7).
pub fn normalize_candle(
    raw: RawCandle,
    symbol: &str,
    timeframe_min: i64,
    source: &str,
) -> Option<Candle> {
    let ts = normalize_ts(&raw.ts).ok()?;
    let aligned_ts = floor(ts, timeframe_min);
    let year = crate::domain::time::to_datetime(aligned_ts).format("%Y").to_string();
    let year: i32 = year.parse().ok()?;
    if !(MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year) {
        return None;
    }
    Some(Candle {
        symbol: symbol.to_string(),
        timeframe_min,
        ts: aligned_ts,
        open: raw.open,
        high: raw.high,
        low: raw.low,
        close: raw.close,
        volume: raw.volume,
        source: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(ts_ms: i64) -> RawCandle {
        RawCandle {
            ts: RawTimestamp::Number(ts_ms),
            open: dec!(100),
            high: dec!(110),
            low: dec!(90),
            close: dec!(105),
            volume: dec!(1000),
        }
    }

    #[test]
    fn drops_year_out_of_range() {
        // year 2008
        let too_early = raw(1_199_145_600_000);
        assert!(normalize_candle(too_early, "BTC-PERPETUAL", 1, "test").is_none());
    }

    #[test]
    fn accepts_valid_year_and_aligns() {
        let c = raw(1_704_067_200_000 + 37_000); // a few seconds past boundary
        let candle = normalize_candle(c, "BTC-PERPETUAL", 1, "test").unwrap();
        assert!(candle.is_ts_aligned());
    }

    #[test]
    fn true_range_uses_prev_close() {
        let candle = Candle {
            symbol: "BTC-PERPETUAL".into(),
            timeframe_min: 1,
            ts: 0,
            open: dec!(100),
            high: dec!(110),
            low: dec!(95),
            close: dec!(105),
            volume: dec!(1),
            source: "t".into(),
        };
        // high-low=15, |high-prevclose|=10, |low-prevclose|=5 -> max 15
        assert_eq!(candle.true_range(dec!(100)), dec!(15));
        // prev close far below low widens the range
        assert_eq!(candle.true_range(dec!(80)), dec!(30));
    }
}
