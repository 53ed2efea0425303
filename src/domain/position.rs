//! In-flight simulated position (spec §3 "Position").

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

/// Lives inside a single simulation (backtest or paper account). Created by
/// a strategy signal, terminated by SL/TP/timeout/end-of-data.
///
/// Invariant: for `Side::Long`, `stop_loss < entry < take_profit`, and the
/// inverse for `Side::Short`. Constructed only via `Position::new`, which
/// enforces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry: Decimal,
    pub size: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub opened_at: i64,
    pub fees_paid: Decimal,
    pub trade_id: Option<uuid::Uuid>,
    /// Maximum Favorable / Adverse Excursion seen so far, as a percent of
    /// entry price. Updated per candle while the position stays open
    /// (spec §4.H step 3); both start at zero and only grow.
    pub mfe_pct: f64,
    pub mae_pct: f64,
}

impl Position {
    pub fn new(
        side: Side,
        entry: Decimal,
        size: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
        opened_at: i64,
        fees_paid: Decimal,
    ) -> anyhow::Result<Self> {
        let ordered = match side {
            Side::Long => stop_loss < entry && entry < take_profit,
            Side::Short => take_profit < entry && entry < stop_loss,
        };
        if !ordered {
            anyhow::bail!(
                "invalid position: side={:?} sl={} entry={} tp={}",
                side,
                stop_loss,
                entry,
                take_profit
            );
        }
        Ok(Self {
            side,
            entry,
            size,
            stop_loss,
            take_profit,
            opened_at,
            fees_paid,
            trade_id: None,
            mfe_pct: 0.0,
            mae_pct: 0.0,
        })
    }

    /// Folds one candle's high/low into the running MFE/MAE, as a percent
    /// of entry price. Both are non-negative and monotonically non-decreasing
    /// over a position's life.
    pub fn update_excursion(&mut self, high: Decimal, low: Decimal) {
        let favorable = match self.side {
            Side::Long => (high - self.entry) / self.entry,
            Side::Short => (self.entry - low) / self.entry,
        };
        let adverse = match self.side {
            Side::Long => (self.entry - low) / self.entry,
            Side::Short => (high - self.entry) / self.entry,
        };
        let favorable_pct = (favorable * Decimal::from(100)).to_f64().unwrap_or(0.0);
        let adverse_pct = (adverse * Decimal::from(100)).to_f64().unwrap_or(0.0);
        self.mfe_pct = self.mfe_pct.max(favorable_pct.max(0.0));
        self.mae_pct = self.mae_pct.max(adverse_pct.max(0.0));
    }
}

/// At most one long and one short simultaneously, never two of the same
/// side (spec §3 "Paper Account" invariant, reused for backtest positions).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenPositions {
    pub long: Option<Position>,
    pub short: Option<Position>,
}

impl OpenPositions {
    pub fn get(&self, side: Side) -> Option<&Position> {
        match side {
            Side::Long => self.long.as_ref(),
            Side::Short => self.short.as_ref(),
        }
    }

    pub fn set(&mut self, side: Side, position: Option<Position>) {
        match side {
            Side::Long => self.long = position,
            Side::Short => self.short = position,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.long.is_none() && self.short.is_none()
    }
}
