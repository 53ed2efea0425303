//! Per-timeframe derived market-structure snapshot (spec §3 "Timeframe State").

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Chop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

/// A confirmed swing extreme: `price` at candle index `ts`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub ts: i64,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMeta {
    pub pivot_len: usize,
    pub pivot_high_count: usize,
    pub pivot_low_count: usize,
}

/// Derived snapshot at `(symbol, timeframe_min, ts)`. Computed only from
/// candles whose `ts <= state.ts`; advances monotonically in `ts` for a
/// given `(symbol, timeframe_min)`. Owned exclusively by the state builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeState {
    pub symbol: String,
    pub timeframe_min: i64,
    pub ts: i64,
    pub trend: Trend,
    pub atr: Option<Decimal>,
    pub last_pivot_high: Option<Pivot>,
    pub last_pivot_low: Option<Pivot>,
    pub last_bos: Option<Direction>,
    pub last_choch: Option<Direction>,
    pub meta: StateMeta,
}

impl TimeframeState {
    pub fn last_swing_high(&self) -> Option<Decimal> {
        self.last_pivot_high.as_ref().map(|p| p.price)
    }

    pub fn last_swing_low(&self) -> Option<Decimal> {
        self.last_pivot_low.as_ref().map(|p| p.price)
    }
}
