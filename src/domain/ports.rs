//! Trait boundaries for the external collaborators named in spec §1/§6:
//! the exchange adapter, the persistent store, and the notification sink.
//! Concrete adapters live under `infrastructure/`; everything in
//! `application/` depends only on these traits.

use crate::domain::candle::{Candle, RawCandle};
use crate::domain::paper::{EquitySnapshot, PaperAccount, PaperConfig, PaperEvent, PaperRun};
use crate::domain::state::TimeframeState;
use crate::domain::trade::Trade;
use crate::domain::optimizer_run::{AllConfigResult, OosResult, OptimizerRun, TopConfig};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetches raw candles for `symbol`/`timeframe_min` in `[start_ts, end_ts]`.
    /// The adapter itself does no alignment or validation — that is the
    /// ingest engine's job.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe_min: i64,
        start_ts: i64,
        end_ts: i64,
    ) -> anyhow::Result<Vec<RawCandle>>;
}

#[async_trait]
pub trait CandleStore: Send + Sync {
    /// `ON CONFLICT(symbol, timeframe_min, ts) DO UPDATE` semantics; returns
    /// the number of rows written (not distinguishing insert vs update).
    async fn upsert_many(&self, candles: &[Candle]) -> anyhow::Result<usize>;

    async fn max_ts(&self, symbol: &str, timeframe_min: i64) -> anyhow::Result<Option<i64>>;

    /// Inclusive range query, ordered by `ts` ascending, capped at `limit`
    /// rows when `limit` is `Some`.
    async fn range(
        &self,
        symbol: &str,
        timeframe_min: i64,
        start_ts: i64,
        end_ts: i64,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<Candle>>;
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// `ON CONFLICT(symbol, timeframe_min, ts) DO UPDATE`.
    async fn upsert(&self, state: &TimeframeState) -> anyhow::Result<()>;

    async fn latest(
        &self,
        symbol: &str,
        timeframe_min: i64,
    ) -> anyhow::Result<Option<TimeframeState>>;
}

#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Idempotent on `(run_id, config_id, opened_at, side, entry)`: a
    /// duplicate insert must return the pre-existing row.
    async fn insert_trade(&self, trade: Trade) -> anyhow::Result<Trade>;

    #[allow(clippy::too_many_arguments)]
    async fn close_trade(
        &self,
        id: Uuid,
        closed_at: i64,
        exit: rust_decimal::Decimal,
        pnl_pct: f64,
        pnl_abs: rust_decimal::Decimal,
        fees_abs: rust_decimal::Decimal,
        result: crate::domain::trade::TradeResult,
        meta: serde_json::Value,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait OptimizerStore: Send + Sync {
    async fn create_run(&self, run: &OptimizerRun) -> anyhow::Result<()>;
    async fn patch_run_counts(
        &self,
        run_id: Uuid,
        total_configs: usize,
        valid_configs: usize,
    ) -> anyhow::Result<()>;
    async fn save_top_configs(&self, rows: &[TopConfig]) -> anyhow::Result<()>;
    async fn save_all_configs(&self, rows: &[AllConfigResult]) -> anyhow::Result<()>;
    async fn save_oos_results(&self, rows: &[OosResult]) -> anyhow::Result<()>;
    async fn load_top_configs(&self, run_id: Uuid, top_n: usize) -> anyhow::Result<Vec<TopConfig>>;
}

#[async_trait]
pub trait PaperStore: Send + Sync {
    async fn load_run(&self, id: Uuid) -> anyhow::Result<Option<PaperRun>>;
    async fn create_run(&self, run: &PaperRun) -> anyhow::Result<()>;
    async fn save_run_status(
        &self,
        id: Uuid,
        status: crate::domain::paper::PaperRunStatus,
    ) -> anyhow::Result<()>;

    async fn insert_paper_config(&self, cfg: &PaperConfig) -> anyhow::Result<()>;
    async fn list_paper_configs(&self, run_id: Uuid) -> anyhow::Result<Vec<PaperConfig>>;
    async fn set_config_active(
        &self,
        id: Uuid,
        is_active: bool,
        kill_reason: Option<String>,
    ) -> anyhow::Result<()>;

    async fn upsert_account(&self, account: &PaperAccount) -> anyhow::Result<()>;
    async fn get_account(
        &self,
        run_id: Uuid,
        config_id: Uuid,
    ) -> anyhow::Result<Option<PaperAccount>>;
    async fn list_active_accounts(&self, run_id: Uuid) -> anyhow::Result<Vec<PaperAccount>>;

    async fn insert_equity_snapshot(&self, snapshot: &EquitySnapshot) -> anyhow::Result<()>;

    /// Appends an audit-trail row; never updated or deleted.
    async fn insert_event(&self, event: &PaperEvent) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &str, payload: serde_json::Value) -> anyhow::Result<()>;
}

/// Sink for the paper runner's gauges/counters, kept as a port so
/// `application::paper_runner` never depends on the `prometheus` crate
/// directly (spec §2 ambient stack — metrics stay an infrastructure
/// concern, same boundary `Notifier` and `ExchangeClient` sit behind).
pub trait PaperMetricsSink: Send + Sync {
    fn set_active_accounts(&self, count: usize);
    fn record_kill(&self, reason_kind: &str);
    fn set_account_equity(&self, rank: i32, equity: f64);
    fn set_account_drawdown(&self, rank: i32, dd_pct: f64);
}
