//! Parameter grid generation and pruning (spec §4.I, §6).

use crate::domain::strategy_config::{EntryTrigger, StrategyConfig};
use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// The knob-sets enumerated by the optimizer (spec §6). Fixed knobs
/// (`taker_fee_bps`, `slippage_bps`, `min_risk_pct`, `timeout_min`) are
/// held at their spec defaults via `StrategyConfig::baseline()`.
///
/// `Serialize`/`Deserialize` so an operator can override the default grid
/// with a TOML file (`--grid-config`, spec §2 "Grid config parsing").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub require_5m_align: Vec<bool>,
    pub require_60m_align: Vec<bool>,
    pub entry_trigger: Vec<EntryTrigger>,
    pub rr_target: Vec<Decimal>,
    pub sl_atr_buffer: Vec<Decimal>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            require_5m_align: vec![false, true],
            require_60m_align: vec![false, true],
            entry_trigger: vec![EntryTrigger::Choch, EntryTrigger::Bos, EntryTrigger::Either],
            rr_target: vec![dec!(1.5), dec!(2.0), dec!(2.5)],
            sl_atr_buffer: vec![dec!(0.2), dec!(0.3)],
        }
    }
}

/// Generates the cartesian product of the grid, skipping:
/// - `require_5m_align && require_60m_align` (too restrictive)
/// - `entry_trigger == Choch && require_5m_align` (redundant)
pub fn generate(grid: &ParameterGrid) -> Vec<StrategyConfig> {
    let base = StrategyConfig::baseline();
    let mut out = Vec::new();
    for &r5 in &grid.require_5m_align {
        for &r60 in &grid.require_60m_align {
            if r5 && r60 {
                continue;
            }
            for &trigger in &grid.entry_trigger {
                if trigger == EntryTrigger::Choch && r5 {
                    continue;
                }
                for &rr in &grid.rr_target {
                    for &sl_buf in &grid.sl_atr_buffer {
                        out.push(StrategyConfig {
                            require_5m_align: r5,
                            require_60m_align: r60,
                            entry_trigger: trigger,
                            rr_target: rr,
                            sl_atr_buffer: sl_buf,
                            ..base.clone()
                        });
                    }
                }
            }
        }
    }
    out
}

/// Loads an operator-supplied grid override from a TOML file, falling back
/// to [`ParameterGrid::default`] is the caller's job when no path is given.
pub fn load_grid_from_toml(path: &str) -> anyhow::Result<ParameterGrid> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read grid config file '{path}'"))?;
    toml::from_str(&content).with_context(|| format!("failed to parse grid config TOML '{path}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prunes_overly_restrictive_and_redundant_combos() {
        let configs = generate(&ParameterGrid::default());
        assert!(configs.iter().all(|c| !(c.require_5m_align && c.require_60m_align)));
        assert!(configs.iter().all(|c| !(c.entry_trigger == EntryTrigger::Choch && c.require_5m_align)));
        assert!(!configs.is_empty());
    }

    #[test]
    fn grid_size_matches_pruned_cartesian_product() {
        let grid = ParameterGrid::default();
        let configs = generate(&grid);
        // 2(r5)*2(r60) combos minus the (true,true) pair = 3 valid (r5,r60) pairs.
        // Of those, r5=true pairs with 2 non-choch triggers, r5=false pairs with all 3.
        let expected_combo_count =
            // r5=false, r60=false: 3 triggers
            3 +
            // r5=false, r60=true: 3 triggers
            3 +
            // r5=true, r60=false: 2 triggers (bos, either)
            2;
        let expected = expected_combo_count * grid.rr_target.len() * grid.sl_atr_buffer.len();
        assert_eq!(configs.len(), expected);
    }

    #[test]
    fn grid_round_trips_through_toml() {
        let grid = ParameterGrid::default();
        let toml_str = toml::to_string(&grid).unwrap();
        let parsed: ParameterGrid = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.rr_target, grid.rr_target);
        assert_eq!(parsed.entry_trigger, grid.entry_trigger);
    }

    #[test]
    fn load_grid_from_toml_reports_missing_file() {
        assert!(load_grid_from_toml("/nonexistent/grid.toml").is_err());
    }
}
