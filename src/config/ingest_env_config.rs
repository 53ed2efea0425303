//! Ingest/backfill environment configuration (spec §6).

use crate::domain::time::normalize_ts;
use crate::domain::time::RawTimestamp;
use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct IngestEnvConfig {
    pub symbol: String,
    pub timeframes: Vec<i64>,
    pub poll_seconds: u64,
    pub backfill: bool,
    pub backfill_start_ts: Option<i64>,
    pub backfill_end_ts: Option<i64>,
    pub dry_run: bool,
}

fn parse_timeframes(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(|s| s.trim().parse::<i64>().with_context(|| format!("invalid timeframe minutes '{s}'")))
        .collect()
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

fn parse_bool_env(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl IngestEnvConfig {
    pub fn from_env() -> Result<Self> {
        let symbol = env::var("SYMBOL").unwrap_or_else(|_| "BTC-PERPETUAL".to_string());

        let timeframes_raw = env::var("INGEST_TIMEFRAMES")
            .or_else(|_| env::var("BACKFILL_TIMEFRAMES"))
            .unwrap_or_else(|_| "1,5,15,60".to_string());
        let timeframes = parse_timeframes(&timeframes_raw).context("failed to parse timeframes")?;
        if timeframes.is_empty() {
            anyhow::bail!("INGEST_TIMEFRAMES/BACKFILL_TIMEFRAMES must list at least one timeframe");
        }

        let poll_seconds = env::var("INGEST_POLL_SECONDS")
            .or_else(|_| env::var("POLL_SECONDS"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15u64);

        let backfill = parse_bool_env("BACKFILL", false) || parse_bool_env("BACKFILL_MODE", false);
        let backfill_start_ts = parse_iso_env("BACKFILL_START_TS")?;
        let backfill_end_ts = parse_iso_env("BACKFILL_END_TS")?;
        if backfill && (backfill_start_ts.is_none() || backfill_end_ts.is_none()) {
            anyhow::bail!("BACKFILL requires both BACKFILL_START_TS and BACKFILL_END_TS");
        }

        let dry_run = parse_bool_env("DRY_RUN", false);

        Ok(Self {
            symbol,
            timeframes,
            poll_seconds,
            backfill,
            backfill_start_ts,
            backfill_end_ts,
            dry_run,
        })
    }
}
