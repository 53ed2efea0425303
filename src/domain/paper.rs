//! Paper-trade runner aggregates (spec §3 "Paper Run").

use crate::domain::position::OpenPositions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperRunStatus {
    Running,
    Stopped,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRun {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe_min: i64, // always 1, per spec
    pub status: PaperRunStatus,
}

/// One ranked configuration attached to a `PaperRun`. `is_active` flips to
/// `false` permanently once a kill rule fires (spec §4.J).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    pub id: Uuid,
    pub run_id: Uuid,
    pub rank: i32,
    pub config: crate::domain::strategy_config::StrategyConfig,
    pub is_active: bool,
    pub kill_reason: Option<String>,
}

/// One account per `PaperConfig`. Owned exclusively by the unique account
/// loop iteration that advances it — no in-process locking required because
/// each `(run_id, paper_config_id)` has a single writer (spec §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperAccount {
    pub run_id: Uuid,
    pub paper_config_id: Uuid,
    pub balance_start: Decimal,
    pub balance: Decimal,
    pub equity: Decimal,
    pub max_equity: Decimal,
    pub max_drawdown_pct: f64,
    pub open_positions: OpenPositions,
    pub trades_count: u64,
    pub wins_count: u64,
    pub losses_count: u64,
    pub profit_factor: f64,
    pub last_candle_ts: Option<i64>,
    pub gross_wins: Decimal,
    pub gross_losses: Decimal,
}

impl PaperAccount {
    pub fn new(run_id: Uuid, paper_config_id: Uuid, balance_start: Decimal) -> Self {
        Self {
            run_id,
            paper_config_id,
            balance_start,
            balance: balance_start,
            equity: balance_start,
            max_equity: balance_start,
            max_drawdown_pct: 0.0,
            open_positions: OpenPositions::default(),
            trades_count: 0,
            wins_count: 0,
            losses_count: 0,
            profit_factor: 0.0,
            last_candle_ts: None,
            gross_wins: Decimal::ZERO,
            gross_losses: Decimal::ZERO,
        }
    }

    /// Realized PnL percent since inception, used by kill rules.
    pub fn realized_pnl_pct(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        if self.balance_start.is_zero() {
            return 0.0;
        }
        ((self.balance - self.balance_start) / self.balance_start * Decimal::from(100))
            .to_f64()
            .unwrap_or(0.0)
    }
}

/// `(run_id, config_id, ts)` unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub run_id: Uuid,
    pub config_id: Uuid,
    pub ts: i64,
    pub equity: Decimal,
    pub balance: Decimal,
    pub dd_pct: f64,
}

/// Append-only audit trail row (spec §6 "paper_events"). Written for
/// notable, non-error occurrences the operator would want a history of —
/// currently just kill-rule firings — without overloading `tracing` as the
/// only record of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperEvent {
    pub run_id: Uuid,
    pub config_id: Option<Uuid>,
    pub event: String,
    pub payload: serde_json::Value,
    pub created_at: i64,
}
