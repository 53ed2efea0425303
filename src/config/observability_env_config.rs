//! Observability environment configuration (spec §2 ambient stack): push-based
//! metrics, no HTTP server — mirrors the teacher's
//! `infrastructure/observability/metrics.rs` reporting cadence.

use std::env;

#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl ObservabilityEnvConfig {
    pub fn from_env() -> Self {
        let enabled = env::var("OBSERVABILITY_ENABLED")
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);
        let interval_secs = env::var("OBSERVABILITY_INTERVAL").ok().and_then(|v| v.parse().ok()).unwrap_or(60u64);
        Self { enabled, interval_secs }
    }
}
