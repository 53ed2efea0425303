//! Paper/backtest engine primitives shared by the backtest engine and the
//! paper-trade runner (spec §4.G). Pure functions over `Decimal` money
//! values — no I/O, no clock reads.

use crate::domain::candle::Candle;
use crate::domain::position::{OpenPositions, Position, Side};
use crate::domain::trade::TradeResult;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

/// `notional * fee_bps / 10_000`.
pub fn calc_fees(notional: Decimal, fee_bps: i64) -> Decimal {
    notional * Decimal::from(fee_bps) / dec!(10_000)
}

fn bps_factor(bps: i64) -> Decimal {
    Decimal::from(bps) / dec!(10_000)
}

/// Entry slippage: longs pay up, shorts receive less.
pub fn apply_slippage(price: Decimal, side: Side, bps: i64) -> Decimal {
    let f = bps_factor(bps);
    match side {
        Side::Long => price * (Decimal::ONE + f),
        Side::Short => price * (Decimal::ONE - f),
    }
}

/// Exit slippage is the inverse direction of entry slippage: closing a long
/// is a sell (receives less), closing a short is a buy (pays more).
pub fn apply_exit_slippage(price: Decimal, side: Side, bps: i64) -> Decimal {
    let f = bps_factor(bps);
    match side {
        Side::Long => price * (Decimal::ONE - f),
        Side::Short => price * (Decimal::ONE + f),
    }
}

/// Opens a position sized by risk percent of equity:
/// `size = (equity * risk_pct) / (|entry - sl| / entry * entry)`, simplified
/// to `size = (equity * risk_pct) / |entry - sl|`. The fill price includes
/// entry slippage; fees are charged on the filled notional at open.
pub fn open_position(
    side: Side,
    equity: Decimal,
    risk_pct: Decimal,
    entry: Decimal,
    sl: Decimal,
    tp: Decimal,
    opened_at: i64,
    fee_bps: i64,
    slippage_bps: i64,
) -> anyhow::Result<Position> {
    let risk_per_unit = (entry - sl).abs();
    anyhow::ensure!(risk_per_unit > Decimal::ZERO, "zero-risk stop distance");
    let size = (equity * risk_pct) / risk_per_unit;
    let fill = apply_slippage(entry, side, slippage_bps);
    let notional = fill * size;
    let fees = calc_fees(notional, fee_bps);
    Position::new(side, fill, size, sl, tp, opened_at, fees)
}

/// Worst-case fill check: if both SL and TP fall inside the candle's
/// `[low, high]` range, SL wins. Otherwise whichever is touched, if either.
pub fn check_exit(position: &Position, candle: &Candle) -> Option<(Decimal, &'static str)> {
    let (hit_sl, hit_tp) = match position.side {
        Side::Long => (
            candle.low <= position.stop_loss,
            candle.high >= position.take_profit,
        ),
        Side::Short => (
            candle.high >= position.stop_loss,
            candle.low <= position.take_profit,
        ),
    };
    match (hit_sl, hit_tp) {
        (true, _) => Some((position.stop_loss, "stop_loss")),
        (false, true) => Some((position.take_profit, "take_profit")),
        (false, false) => None,
    }
}

pub struct CloseOutcome {
    pub fill_exit: Decimal,
    pub exit_fees: Decimal,
    pub total_fees: Decimal,
    pub pnl_abs: Decimal,
    pub pnl_pct: f64,
    pub result: TradeResult,
}

/// Closes a position at `exit_px`, applying inverted-side exit slippage and
/// exit fees, and classifies the result with a ±0.01% breakeven dead zone.
pub fn close_position(
    position: &Position,
    exit_px: Decimal,
    fee_bps: i64,
    slippage_bps: i64,
) -> CloseOutcome {
    let fill_exit = apply_exit_slippage(exit_px, position.side, slippage_bps);
    let exit_notional = fill_exit * position.size;
    let exit_fees = calc_fees(exit_notional, fee_bps);
    let total_fees = position.fees_paid + exit_fees;

    let raw_pnl = match position.side {
        Side::Long => (fill_exit - position.entry) * position.size,
        Side::Short => (position.entry - fill_exit) * position.size,
    };
    let pnl_abs = raw_pnl - total_fees;

    let entry_notional = position.entry * position.size;
    let pnl_pct = if entry_notional.is_zero() {
        0.0
    } else {
        (pnl_abs / entry_notional * dec!(100)).to_f64().unwrap_or(0.0)
    };

    let result = if pnl_pct > 0.01 {
        TradeResult::Win
    } else if pnl_pct < -0.01 {
        TradeResult::Loss
    } else {
        TradeResult::Breakeven
    };

    CloseOutcome {
        fill_exit,
        exit_fees,
        total_fees,
        pnl_abs,
        pnl_pct,
        result,
    }
}

/// `balance + sum(unrealized pnl)` over all open positions, marked at
/// `mark_price`.
pub fn mark_to_market(balance: Decimal, positions: &OpenPositions, mark_price: Decimal) -> Decimal {
    let mut equity = balance;
    if let Some(p) = &positions.long {
        equity += (mark_price - p.entry) * p.size;
    }
    if let Some(p) = &positions.short {
        equity += (p.entry - mark_price) * p.size;
    }
    equity
}

pub struct EquityUpdate {
    pub max_equity: Decimal,
    pub dd_pct: f64,
}

/// New running max-equity and drawdown percent.
pub fn update_equity_and_dd(equity: Decimal, max_equity: Decimal) -> EquityUpdate {
    let new_max = equity.max(max_equity);
    let dd_pct = if new_max > Decimal::ZERO {
        ((new_max - equity) / new_max * dec!(100)).to_f64().unwrap_or(0.0)
    } else {
        0.0
    };
    EquityUpdate {
        max_equity: new_max,
        dd_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle_at(ts: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Candle {
        Candle {
            symbol: "BTC-PERPETUAL".into(),
            timeframe_min: 1,
            ts,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: dec!(1),
            source: "test".into(),
        }
    }

    #[test]
    fn worst_case_fill_picks_sl_scenario_4() {
        let pos = Position::new(Side::Long, dec!(100), dec!(1), dec!(95), dec!(110), 0, Decimal::ZERO).unwrap();
        let candle = candle_at(60_000, dec!(100), dec!(111), dec!(94), dec!(105));
        let (exit, reason) = check_exit(&pos, &candle).unwrap();
        assert_eq!(exit, dec!(95));
        assert_eq!(reason, "stop_loss");
    }

    #[test]
    fn open_close_round_trip_scenario_5() {
        let pos = open_position(
            Side::Long,
            dec!(1000),
            dec!(0.001),
            dec!(100),
            dec!(99),
            dec!(105),
            0,
            5,
            2,
        )
        .unwrap();
        assert_eq!(pos.size, dec!(100));
        assert_eq!(pos.entry, dec!(100.02));
        assert_eq!(pos.fees_paid.round_dp(3), dec!(5.001));

        let outcome = close_position(&pos, dec!(100.02), 5, 2);
        assert!(matches!(outcome.result, TradeResult::Loss));
        assert!(outcome.pnl_abs < Decimal::ZERO);
    }

    #[test]
    fn breakeven_law_zero_cost_close() {
        let pos = Position::new(Side::Long, dec!(100), dec!(1), dec!(95), dec!(110), 0, Decimal::ZERO).unwrap();
        let outcome = close_position(&pos, dec!(100), 0, 0);
        assert_eq!(outcome.pnl_abs, Decimal::ZERO);
        assert!(matches!(outcome.result, TradeResult::Breakeven));
    }

    #[test]
    fn equity_dd_math() {
        let update = update_equity_and_dd(dec!(90), dec!(100));
        assert_eq!(update.max_equity, dec!(100));
        assert_eq!(update.dd_pct, 10.0);

        let update2 = update_equity_and_dd(dec!(110), dec!(100));
        assert_eq!(update2.max_equity, dec!(110));
        assert_eq!(update2.dd_pct, 0.0);
    }
}
