//! Multi-timeframe state builder (spec §4.E).
//!
//! Deterministic by construction: every function here is a pure fold over
//! a candle slice. Replaying the same candle prefix always yields the same
//! `TimeframeState`, bit for bit (spec §8 "ATR determinism").

use crate::domain::candle::Candle;
use crate::domain::state::{Direction, Pivot, StateMeta, TimeframeState, Trend};
use rust_decimal::Decimal;

pub const ATR_PERIOD: usize = 14;
pub const PIVOT_LEN: usize = 2;

/// Simple mean of the last `ATR_PERIOD` true ranges. `None` if fewer than
/// `ATR_PERIOD + 1` candles are available (need one extra for the seed
/// previous-close).
pub fn atr(candles: &[Candle]) -> Option<Decimal> {
    if candles.len() < ATR_PERIOD + 1 {
        return None;
    }
    let start = candles.len() - ATR_PERIOD;
    let mut sum = Decimal::ZERO;
    for i in start..candles.len() {
        let prev_close = candles[i - 1].close;
        sum += candles[i].true_range(prev_close);
    }
    Some(sum / Decimal::from(ATR_PERIOD as i64))
}

/// Finds all confirmed pivot highs/lows with pivot length `PIVOT_LEN`. A
/// pivot-high at index `i` requires `high[i] > high[j]` strictly for every
/// `j` in `[i-L, i-1] ∪ [i+1, i+L]`; ties disqualify. Confirmation requires
/// `L` candles after `i` to exist, so the trailing `L` candles are never
/// considered.
pub fn find_pivots(candles: &[Candle]) -> (Vec<Pivot>, Vec<Pivot>) {
    let l = PIVOT_LEN;
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    if candles.len() < 2 * l + 1 {
        return (highs, lows);
    }
    for i in l..candles.len() - l {
        let h = candles[i].high;
        let is_high = (i - l..i).chain(i + 1..=i + l).all(|j| candles[j].high < h);
        if is_high {
            highs.push(Pivot { ts: candles[i].ts, price: h });
        }
        let low = candles[i].low;
        let is_low = (i - l..i).chain(i + 1..=i + l).all(|j| candles[j].low > low);
        if is_low {
            lows.push(Pivot { ts: candles[i].ts, price: low });
        }
    }
    (highs, lows)
}

/// Trend regime from the last two pivot-highs and last two pivot-lows.
/// Fewer than two of either pivot kind is `Chop` (spec §4.E).
pub fn trend_from_pivots(highs: &[Pivot], lows: &[Pivot]) -> Trend {
    if highs.len() < 2 || lows.len() < 2 {
        return Trend::Chop;
    }
    let (h1, h2) = (highs[highs.len() - 2].price, highs[highs.len() - 1].price);
    let (l1, l2) = (lows[lows.len() - 2].price, lows[lows.len() - 1].price);
    if h2 > h1 && l2 > l1 {
        Trend::Up
    } else if h2 < h1 && l2 < l1 {
        Trend::Down
    } else {
        Trend::Chop
    }
}

/// BOS/CHoCH from the latest close against the last pivot-high/low, gated
/// on the prevailing trend (spec §4.E). Returns `(bos, choch)`.
pub fn bos_choch(
    trend: Trend,
    close: Decimal,
    last_high: Option<Decimal>,
    last_low: Option<Decimal>,
) -> (Option<Direction>, Option<Direction>) {
    match trend {
        Trend::Up => {
            let bos = last_high.filter(|&h| close > h).map(|_| Direction::Up);
            let choch = last_low.filter(|&l| close < l).map(|_| Direction::Down);
            (bos, choch)
        }
        Trend::Down => {
            let bos = last_low.filter(|&l| close < l).map(|_| Direction::Down);
            let choch = last_high.filter(|&h| close > h).map(|_| Direction::Up);
            (bos, choch)
        }
        Trend::Chop => (None, None),
    }
}

/// Builds the `TimeframeState` for `(symbol, timeframe_min)` as of the last
/// candle in `candles`. `candles` must be sorted ascending by `ts` and
/// contain only candles with `ts <= state.ts` (the caller's lookback
/// window).
pub fn build_state(symbol: &str, timeframe_min: i64, candles: &[Candle]) -> Option<TimeframeState> {
    let latest = candles.last()?;
    let (highs, lows) = find_pivots(candles);
    let trend = trend_from_pivots(&highs, &lows);
    let last_pivot_high = highs.last().copied();
    let last_pivot_low = lows.last().copied();
    let (bos, choch) = bos_choch(
        trend,
        latest.close,
        last_pivot_high.map(|p| p.price),
        last_pivot_low.map(|p| p.price),
    );
    Some(TimeframeState {
        symbol: symbol.to_string(),
        timeframe_min,
        ts: latest.ts,
        trend,
        atr: atr(candles),
        last_pivot_high,
        last_pivot_low,
        last_bos: bos,
        last_choch: choch,
        meta: StateMeta {
            pivot_len: PIVOT_LEN,
            pivot_high_count: highs.len(),
            pivot_low_count: lows.len(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(ts: i64, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            symbol: "BTC-PERPETUAL".into(),
            timeframe_min: 1,
            ts,
            open: close,
            high,
            low,
            close,
            volume: dec!(1),
            source: "test".into(),
        }
    }

    #[test]
    fn atr_scenario_1_flat_true_range() {
        // 15 candles with high=10, low=0, close=5, prevClose=5 -> TR=10 each -> ATR=10
        let candles: Vec<Candle> = (0..15)
            .map(|i| candle(i * 60_000, dec!(10), dec!(0), dec!(5)))
            .collect();
        assert_eq!(atr(&candles), Some(dec!(10)));
    }

    #[test]
    fn atr_none_below_threshold() {
        let candles: Vec<Candle> = (0..14)
            .map(|i| candle(i * 60_000, dec!(10), dec!(0), dec!(5)))
            .collect();
        assert_eq!(atr(&candles), None);
    }

    #[test]
    fn pivot_detection_scenario_2() {
        let highs = [1, 2, 3, 5, 3, 2, 1];
        let candles: Vec<Candle> = highs
            .iter()
            .enumerate()
            .map(|(i, &h)| candle(i as i64 * 60_000, Decimal::from(h), Decimal::from(h) - dec!(1), Decimal::from(h)))
            .collect();
        let (pivot_highs, _) = find_pivots(&candles);
        assert_eq!(pivot_highs.len(), 1);
        assert_eq!(pivot_highs[0].price, dec!(5));
        assert_eq!(pivot_highs[0].ts, 3 * 60_000);
    }

    #[test]
    fn pivot_detection_tie_disqualifies() {
        let highs = [1, 2, 3, 3, 3, 2, 1];
        let candles: Vec<Candle> = highs
            .iter()
            .enumerate()
            .map(|(i, &h)| candle(i as i64 * 60_000, Decimal::from(h), Decimal::from(h) - dec!(1), Decimal::from(h)))
            .collect();
        let (pivot_highs, _) = find_pivots(&candles);
        assert!(pivot_highs.is_empty());
    }

    #[test]
    fn trend_scenario_3() {
        let up_highs = vec![
            Pivot { ts: 0, price: dec!(100) },
            Pivot { ts: 1, price: dec!(110) },
        ];
        let up_lows = vec![
            Pivot { ts: 0, price: dec!(90) },
            Pivot { ts: 1, price: dec!(95) },
        ];
        assert_eq!(trend_from_pivots(&up_highs, &up_lows), Trend::Up);

        let down_highs = vec![
            Pivot { ts: 0, price: dec!(110) },
            Pivot { ts: 1, price: dec!(100) },
        ];
        let down_lows = vec![
            Pivot { ts: 0, price: dec!(95) },
            Pivot { ts: 1, price: dec!(90) },
        ];
        assert_eq!(trend_from_pivots(&down_highs, &down_lows), Trend::Down);

        let chop_highs = vec![
            Pivot { ts: 0, price: dec!(100) },
            Pivot { ts: 1, price: dec!(110) },
        ];
        let chop_lows = vec![
            Pivot { ts: 0, price: dec!(95) },
            Pivot { ts: 1, price: dec!(90) },
        ];
        assert_eq!(trend_from_pivots(&chop_highs, &chop_lows), Trend::Chop);
    }

    #[test]
    fn bos_in_uptrend() {
        let (bos, choch) = bos_choch(Trend::Up, dec!(111), Some(dec!(110)), Some(dec!(95)));
        assert_eq!(bos, Some(Direction::Up));
        assert_eq!(choch, None);
    }

    #[test]
    fn choch_in_uptrend() {
        let (bos, choch) = bos_choch(Trend::Up, dec!(94), Some(dec!(110)), Some(dec!(95)));
        assert_eq!(bos, None);
        assert_eq!(choch, Some(Direction::Down));
    }

    #[test]
    fn chop_never_sets_bos_or_choch() {
        let (bos, choch) = bos_choch(Trend::Chop, dec!(200), Some(dec!(110)), Some(dec!(95)));
        assert_eq!(bos, None);
        assert_eq!(choch, None);
    }

    #[test]
    fn deterministic_replay() {
        let candles: Vec<Candle> = (0..20)
            .map(|i| candle(i * 60_000, dec!(10) + Decimal::from(i % 3), dec!(0), dec!(5)))
            .collect();
        let s1 = build_state("BTC-PERPETUAL", 1, &candles).unwrap();
        let s2 = build_state("BTC-PERPETUAL", 1, &candles).unwrap();
        assert_eq!(s1.atr, s2.atr);
        assert_eq!(s1.trend, s2.trend);
        assert_eq!(s1.last_bos, s2.last_bos);
    }
}
