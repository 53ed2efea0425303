//! Paper-trade runner environment configuration (spec §6).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PaperEnvConfig {
    pub run_id: Option<Uuid>,
    pub optimizer_run_id: Option<Uuid>,
    pub top_n: usize,
    pub balance_start: Decimal,
    pub poll_seconds: u64,
    pub safe_lag_min: i64,
    pub min_trades_before_kill: u64,
    pub kill_max_dd_pct: f64,
    pub kill_min_pf: f64,
    pub kill_min_pnl_pct: f64,
    pub webhook_url: Option<String>,
}

fn parse_uuid_env(name: &str) -> Result<Option<Uuid>> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(Some(Uuid::from_str(&v).with_context(|| format!("invalid {name} '{v}'"))?)),
        _ => Ok(None),
    }
}

impl PaperEnvConfig {
    pub fn from_env() -> Result<Self> {
        let run_id = parse_uuid_env("PAPER_RUN_ID")?;
        let optimizer_run_id = parse_uuid_env("PAPER_OPTIMIZER_RUN_ID")?;
        if run_id.is_none() && optimizer_run_id.is_none() {
            anyhow::bail!("PAPER_OPTIMIZER_RUN_ID is required to start or resume a paper run");
        }

        let top_n = env::var("PAPER_TOP_N").ok().and_then(|v| v.parse().ok()).unwrap_or(10usize);
        let balance_start = env::var("PAPER_BALANCE_START")
            .ok()
            .and_then(|v| Decimal::from_str(&v).ok())
            .unwrap_or(Decimal::from(1000));
        let poll_seconds = env::var("PAPER_POLL_SECONDS").ok().and_then(|v| v.parse().ok()).unwrap_or(15u64);
        let safe_lag_min = env::var("PAPER_SAFE_LAG_MIN").ok().and_then(|v| v.parse().ok()).unwrap_or(1i64).clamp(0, 10);
        let min_trades_before_kill = env::var("PAPER_MIN_TRADES_BEFORE_KILL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50u64);
        let kill_max_dd_pct = env::var("PAPER_KILL_MAX_DD_PCT").ok().and_then(|v| v.parse().ok()).unwrap_or(12.0f64);
        let kill_min_pf = env::var("PAPER_KILL_MIN_PF").ok().and_then(|v| v.parse().ok()).unwrap_or(0.8f64);
        let kill_min_pnl_pct = env::var("PAPER_KILL_MIN_PNL_PCT").ok().and_then(|v| v.parse().ok()).unwrap_or(-2.0f64);
        let webhook_url = env::var("WEBHOOK_URL").ok().filter(|v| !v.is_empty());

        Ok(Self {
            run_id,
            optimizer_run_id,
            top_n,
            balance_start,
            poll_seconds,
            safe_lag_min,
            min_trades_before_kill,
            kill_max_dd_pct,
            kill_min_pf,
            kill_min_pnl_pct,
            webhook_url,
        })
    }
}
