//! Optimizer environment configuration (spec §6).

use crate::domain::time::{normalize_ts, RawTimestamp};
use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct OptimizerEnvConfig {
    pub dd_limit_pct: f64,
    pub oos_days: i64,
    pub oos_top_n: usize,
    pub oos_start_ts: Option<i64>,
    pub oos_end_ts: Option<i64>,
    pub save_all_configs: bool,
}

fn parse_iso_env(name: &str) -> Result<Option<i64>> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => {
            let ts = normalize_ts(&RawTimestamp::Iso(v.clone()))
                .with_context(|| format!("invalid {name} '{v}', expected ISO-8601"))?;
            Ok(Some(ts))
        }
        _ => Ok(None),
    }
}

impl OptimizerEnvConfig {
    pub fn from_env() -> Result<Self> {
        let dd_limit_pct = env::var("DD_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10.0f64);
        let oos_days = env::var("OOS_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(7i64);
        let oos_top_n = env::var("OOS_TOP_N").ok().and_then(|v| v.parse().ok()).unwrap_or(3usize);
        let oos_start_ts = parse_iso_env("OOS_START_TS")?;
        let oos_end_ts = parse_iso_env("OOS_END_TS")?;
        if oos_start_ts.is_some() != oos_end_ts.is_some() {
            anyhow::bail!("OOS_START_TS and OOS_END_TS must both be set or both omitted");
        }
        let save_all_configs = env::var("SAVE_ALL_CONFIGS")
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            dd_limit_pct,
            oos_days,
            oos_top_n,
            oos_start_ts,
            oos_end_ts,
            save_all_configs,
        })
    }
}
