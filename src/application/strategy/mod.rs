//! Strategy evaluator (spec §4.F): given multi-timeframe state, the current
//! 1-minute candle, and a config, produce an entry signal or none.

use crate::domain::candle::Candle;
use crate::domain::position::Side;
use crate::domain::state::{Direction, TimeframeState, Trend};
use crate::domain::strategy_config::{EntryTrigger, StrategyConfig};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    Primary,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Signal {
    pub direction: Side,
    pub entry: Decimal,
    pub sl: Decimal,
    pub tp: Decimal,
    pub rr: Decimal,
    pub trigger_type: TriggerType,
    pub reason: String,
}

/// State snapshots keyed by timeframe, as seen by the evaluator at one
/// instant: 1m is required, 5m/15m/60m are optional depending on config.
pub struct StateCache<'a> {
    pub state_1m: Option<&'a TimeframeState>,
    pub state_5m: Option<&'a TimeframeState>,
    pub state_15m: Option<&'a TimeframeState>,
    pub state_60m: Option<&'a TimeframeState>,
}

fn direction_filter(states: &StateCache, config: &StrategyConfig) -> Option<Side> {
    let primary = states.state_15m?.trend;
    if primary == Trend::Chop {
        return None;
    }
    if config.require_60m_align {
        let t60 = states.state_60m?.trend;
        if t60 != primary {
            return None;
        }
    }
    if config.require_5m_align {
        let t5 = states.state_5m?.trend;
        if t5 != primary {
            return None;
        }
    }
    let trend_5m = states.state_5m.map(|s| s.trend);
    match primary {
        Trend::Up if trend_5m != Some(Trend::Down) => Some(Side::Long),
        Trend::Down if trend_5m != Some(Trend::Up) => Some(Side::Short),
        _ => None,
    }
}

fn trigger_matches(direction: Side, bos: Option<Direction>, choch: Option<Direction>, entry_trigger: EntryTrigger) -> bool {
    let wanted = match direction {
        Side::Long => Direction::Up,
        Side::Short => Direction::Down,
    };
    let bos_hit = bos == Some(wanted);
    let choch_hit = choch == Some(wanted);
    match entry_trigger {
        EntryTrigger::Bos => bos_hit,
        EntryTrigger::Choch => choch_hit,
        EntryTrigger::Either => bos_hit || choch_hit,
    }
}

fn fallback_trigger(direction: Side, candle: &Candle, state_1m: &TimeframeState) -> bool {
    match direction {
        Side::Long => state_1m
            .last_swing_high()
            .is_some_and(|h| candle.close > h || candle.high > h),
        Side::Short => state_1m
            .last_swing_low()
            .is_some_and(|l| candle.close < l || candle.low < l),
    }
}

/// Evaluates `config` against the current state cache and candle, returning
/// an entry signal or `None`. Pure and side-effect free.
pub fn evaluate(states: &StateCache, candle: &Candle, config: &StrategyConfig) -> Option<Signal> {
    let direction = direction_filter(states, config)?;
    let state_1m = states.state_1m?;

    let primary_hit = trigger_matches(direction, state_1m.last_bos, state_1m.last_choch, config.entry_trigger);
    let fallback_hit = fallback_trigger(direction, candle, state_1m);
    if !primary_hit && !fallback_hit {
        return None;
    }
    let trigger_type = if primary_hit { TriggerType::Primary } else { TriggerType::Fallback };

    let atr_1m = state_1m.atr?;
    if atr_1m <= Decimal::ZERO {
        return None;
    }

    let entry = candle.close;
    let (sl, tp) = match direction {
        Side::Long => {
            let swing_low = state_1m.last_swing_low()?;
            let sl = swing_low - config.sl_atr_buffer * atr_1m;
            let tp = entry + (entry - sl) * config.rr_target;
            (sl, tp)
        }
        Side::Short => {
            let swing_high = state_1m.last_swing_high()?;
            let sl = swing_high + config.sl_atr_buffer * atr_1m;
            let tp = entry - (sl - entry) * config.rr_target;
            (sl, tp)
        }
    };

    let risk_pct = ((entry - sl).abs() / entry).to_f64().unwrap_or(0.0);
    let min_risk_pct = config.min_risk_pct.to_f64().unwrap_or(0.0);
    if risk_pct < min_risk_pct {
        return None;
    }

    Some(Signal {
        direction,
        entry,
        sl,
        tp,
        rr: config.rr_target,
        trigger_type,
        reason: format!(
            "{:?} trend={:?} trigger={:?}",
            direction, state_1m.trend, trigger_type
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::{Pivot, StateMeta};
    use rust_decimal_macros::dec;

    fn state(trend: Trend, atr: Option<Decimal>, bos: Option<Direction>, choch: Option<Direction>, ph: Decimal, pl: Decimal) -> TimeframeState {
        TimeframeState {
            symbol: "BTC-PERPETUAL".into(),
            timeframe_min: 1,
            ts: 0,
            trend,
            atr,
            last_pivot_high: Some(Pivot { ts: 0, price: ph }),
            last_pivot_low: Some(Pivot { ts: 0, price: pl }),
            last_bos: bos,
            last_choch: choch,
            meta: StateMeta { pivot_len: 2, pivot_high_count: 1, pivot_low_count: 1 },
        }
    }

    fn candle(close: Decimal) -> Candle {
        Candle {
            symbol: "BTC-PERPETUAL".into(),
            timeframe_min: 1,
            ts: 0,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            source: "test".into(),
        }
    }

    #[test]
    fn chop_15m_yields_no_signal() {
        let s1m = state(Trend::Up, Some(dec!(1)), Some(Direction::Up), None, dec!(110), dec!(95));
        let s15m = state(Trend::Chop, None, None, None, dec!(110), dec!(95));
        let cache = StateCache {
            state_1m: Some(&s1m),
            state_5m: None,
            state_15m: Some(&s15m),
            state_60m: None,
        };
        let config = StrategyConfig::baseline();
        assert!(evaluate(&cache, &candle(dec!(111)), &config).is_none());
    }

    #[test]
    fn long_signal_with_bos_trigger() {
        let s1m = state(Trend::Up, Some(dec!(1)), Some(Direction::Up), None, dec!(110), dec!(95));
        let s15m = state(Trend::Up, None, None, None, dec!(110), dec!(95));
        let cache = StateCache {
            state_1m: Some(&s1m),
            state_5m: None,
            state_15m: Some(&s15m),
            state_60m: None,
        };
        let mut config = StrategyConfig::baseline();
        config.entry_trigger = EntryTrigger::Bos;
        config.min_risk_pct = dec!(0.0001);
        let signal = evaluate(&cache, &candle(dec!(111)), &config).unwrap();
        assert_eq!(signal.direction, Side::Long);
        assert_eq!(signal.trigger_type, TriggerType::Primary);
        assert!(signal.sl < signal.entry && signal.entry < signal.tp);
    }

    #[test]
    fn min_risk_pct_rejects_tight_stop() {
        let s1m = state(Trend::Up, Some(dec!(0.01)), Some(Direction::Up), None, dec!(110), dec!(109.9));
        let s15m = state(Trend::Up, None, None, None, dec!(110), dec!(109.9));
        let cache = StateCache {
            state_1m: Some(&s1m),
            state_5m: None,
            state_15m: Some(&s15m),
            state_60m: None,
        };
        let mut config = StrategyConfig::baseline();
        config.min_risk_pct = dec!(0.05);
        assert!(evaluate(&cache, &candle(dec!(111)), &config).is_none());
    }
}
