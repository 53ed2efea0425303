//! Configuration module, organized by domain: ingest, optimizer, paper-runner,
//! observability (spec §2 ambient stack / §6 environment variables), mirroring
//! the teacher's `config/` split into per-concern sub-configs.

mod ingest_env_config;
mod observability_env_config;
mod optimizer_env_config;
mod paper_env_config;

pub use ingest_env_config::IngestEnvConfig;
pub use observability_env_config::ObservabilityEnvConfig;
pub use optimizer_env_config::OptimizerEnvConfig;
pub use paper_env_config::PaperEnvConfig;

use anyhow::Result;
use std::env;

/// Top-level config shared by every binary: where the store lives and where
/// the exchange adapter points. Component-specific settings live in the
/// sub-configs above, loaded independently by the binary that needs them.
#[derive(Debug, Clone)]
pub struct CoreEnvConfig {
    pub database_url: String,
    pub exchange_base_url: String,
    pub source: String,
    pub batch_limit: i64,
}

impl CoreEnvConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/perpbot.db".to_string());
        let exchange_base_url = env::var("EXCHANGE_BASE_URL").unwrap_or_else(|_| "https://api.binance.com".to_string());
        let source = env::var("EXCHANGE_SOURCE").unwrap_or_else(|_| "binance".to_string());
        let batch_limit = env::var("INGEST_BATCH_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(1000i64);

        Ok(Self {
            database_url,
            exchange_base_url,
            source,
            batch_limit,
        })
    }
}

/// Loads a `.env` file if present, silently continuing if it doesn't exist —
/// matches the teacher's `main.rs` startup sequence.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
