//! Closed or open trade record (spec §3 "Trade (persisted)").

use crate::domain::position::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeResult {
    Win,
    Loss,
    Breakeven,
}

/// Idempotent on `(run_id, config_id, opened_at, side, entry)` — a duplicate
/// insert must return the existing row rather than erroring or duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub run_id: Uuid,
    pub config_id: Uuid,
    pub opened_at: i64,
    pub side: Side,
    pub entry: Decimal,
    pub size: Decimal,
    pub sl: Decimal,
    pub tp: Decimal,
    pub closed_at: Option<i64>,
    pub exit: Option<Decimal>,
    pub pnl_pct: Option<f64>,
    pub pnl_abs: Option<Decimal>,
    pub fees_abs: Option<Decimal>,
    pub result: Option<TradeResult>,
    pub meta: serde_json::Value,
}

impl Trade {
    pub fn conflict_key(&self) -> (Uuid, Uuid, i64, Side, Decimal) {
        (self.run_id, self.config_id, self.opened_at, self.side, self.entry)
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}
