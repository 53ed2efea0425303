//! Prometheus metric definitions for the platform.
//!
//! All metrics use the `perpbot_` prefix and are read-only from the rest of
//! the crate's perspective: each component increments/sets its own gauges
//! and counters, nothing scrapes them over HTTP (spec §2 "Observability").

use prometheus::{
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
    CounterVec, Gauge, GaugeVec, Opts, Registry,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    /// Candles upserted, by (symbol, timeframe_min).
    pub candles_ingested_total: CounterVec,
    /// Ingest pages fetched, by (symbol, timeframe_min).
    pub ingest_pages_total: CounterVec,
    /// Timeframes aborted after too many pages or a fatal fetch error.
    pub ingest_timeframe_aborts_total: CounterVec,

    /// Backtests completed, by outcome ("ok" / "errored").
    pub backtests_run_total: CounterVec,

    /// Optimizer configs scored in the most recent grid, by outcome.
    pub optimizer_configs_scored_total: CounterVec,
    /// Optimizer runs completed.
    pub optimizer_runs_total: Gauge,

    /// Currently active (non-killed) paper accounts.
    pub paper_active_accounts: GenericGauge<AtomicF64>,
    /// Kill-rule activations, by reason kind ("drawdown" / "profit_factor" / "pnl").
    pub paper_kill_rule_hits_total: CounterVec,
    /// Latest equity per paper config rank.
    pub paper_account_equity_usd: GenericGaugeVec<AtomicF64>,
    /// Latest drawdown percent per paper config rank.
    pub paper_account_drawdown_pct: GenericGaugeVec<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let candles_ingested_total = CounterVec::new(
            Opts::new("perpbot_candles_ingested_total", "Candles upserted into the store"),
            &["symbol", "timeframe_min"],
        )?;
        registry.register(Box::new(candles_ingested_total.clone()))?;

        let ingest_pages_total = CounterVec::new(
            Opts::new("perpbot_ingest_pages_total", "Exchange fetch pages requested"),
            &["symbol", "timeframe_min"],
        )?;
        registry.register(Box::new(ingest_pages_total.clone()))?;

        let ingest_timeframe_aborts_total = CounterVec::new(
            Opts::new("perpbot_ingest_timeframe_aborts_total", "Timeframes aborted mid-ingest"),
            &["symbol", "timeframe_min"],
        )?;
        registry.register(Box::new(ingest_timeframe_aborts_total.clone()))?;

        let backtests_run_total = CounterVec::new(
            Opts::new("perpbot_backtests_run_total", "Backtests completed, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(backtests_run_total.clone()))?;

        let optimizer_configs_scored_total = CounterVec::new(
            Opts::new("perpbot_optimizer_configs_scored_total", "Configs scored by the optimizer"),
            &["outcome"],
        )?;
        registry.register(Box::new(optimizer_configs_scored_total.clone()))?;

        let optimizer_runs_total = Gauge::with_opts(Opts::new(
            "perpbot_optimizer_runs_total",
            "Optimizer runs completed since process start",
        ))?;
        registry.register(Box::new(optimizer_runs_total.clone()))?;

        let paper_active_accounts = Gauge::with_opts(Opts::new(
            "perpbot_paper_active_accounts",
            "Currently active paper-trading accounts",
        ))?;
        registry.register(Box::new(paper_active_accounts.clone()))?;

        let paper_kill_rule_hits_total = CounterVec::new(
            Opts::new("perpbot_paper_kill_rule_hits_total", "Kill-rule activations, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(paper_kill_rule_hits_total.clone()))?;

        let paper_account_equity_usd = GaugeVec::new(
            Opts::new("perpbot_paper_account_equity_usd", "Latest equity per paper config rank"),
            &["rank"],
        )?;
        registry.register(Box::new(paper_account_equity_usd.clone()))?;

        let paper_account_drawdown_pct = GaugeVec::new(
            Opts::new("perpbot_paper_account_drawdown_pct", "Latest drawdown percent per paper config rank"),
            &["rank"],
        )?;
        registry.register(Box::new(paper_account_drawdown_pct.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            candles_ingested_total,
            ingest_pages_total,
            ingest_timeframe_aborts_total,
            backtests_run_total,
            optimizer_configs_scored_total,
            optimizer_runs_total,
            paper_active_accounts,
            paper_kill_rule_hits_total,
            paper_account_equity_usd,
            paper_account_drawdown_pct,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl crate::domain::ports::PaperMetricsSink for Metrics {
    fn set_active_accounts(&self, count: usize) {
        self.paper_active_accounts.set(count as f64);
    }

    fn record_kill(&self, reason_kind: &str) {
        self.paper_kill_rule_hits_total.with_label_values(&[reason_kind]).inc();
    }

    fn set_account_equity(&self, rank: i32, equity: f64) {
        self.paper_account_equity_usd.with_label_values(&[&rank.to_string()]).set(equity);
    }

    fn set_account_drawdown(&self, rank: i32, dd_pct: f64) {
        self.paper_account_drawdown_pct.with_label_values(&[&rank.to_string()]).set(dd_pct);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_without_duplicate_metric_panics() {
        let metrics = Metrics::new().unwrap();
        metrics.candles_ingested_total.with_label_values(&["BTC-PERPETUAL", "1"]).inc();
        assert_eq!(metrics.registry().gather().len() > 0, true);
    }
}
