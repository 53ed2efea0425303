//! Tagged, immutable bag of strategy knobs (spec §3 "Strategy Config").

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryTrigger {
    Choch,
    Bos,
    Either,
}

/// Immutable once created. The grid-values used by the optimizer are
/// enumerated in `application::optimizer::grid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub require_5m_align: bool,
    pub require_60m_align: bool,
    pub entry_trigger: EntryTrigger,
    pub rr_target: Decimal,
    pub timeout_min: i64,
    pub sl_atr_buffer: Decimal,
    pub min_risk_pct: Decimal,
    pub taker_fee_bps: i64,
    pub slippage_bps: i64,
}

impl StrategyConfig {
    /// The fixed defaults from spec §6, used as the base for grid variants.
    pub fn baseline() -> Self {
        use rust_decimal_macros::dec;
        Self {
            require_5m_align: false,
            require_60m_align: false,
            entry_trigger: EntryTrigger::Either,
            rr_target: dec!(2.0),
            timeout_min: 0,
            sl_atr_buffer: dec!(0.3),
            min_risk_pct: dec!(0.001),
            taker_fee_bps: 5,
            slippage_bps: 2,
        }
    }
}
