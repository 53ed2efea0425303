//! Concurrent paper-trade runner (spec §4.J): resumes or creates a
//! `PaperRun`, seeds one account per ranked config, and polls forever,
//! advancing each account independently over newly ingested candles until
//! a cooperative stop signal fires.

use crate::application::paper_engine::{
    apply_exit_slippage, calc_fees, check_exit, mark_to_market, update_equity_and_dd,
};
use crate::application::state_builder::build_state;
use crate::application::strategy::{evaluate, StateCache};
use crate::domain::candle::Candle;
use crate::domain::errors::PaperRunnerError;
use crate::domain::paper::{EquitySnapshot, PaperAccount, PaperConfig, PaperEvent, PaperRun, PaperRunStatus};
use crate::domain::ports::{CandleStore, Notifier, OptimizerStore, PaperMetricsSink, PaperStore, TradeStore};
use crate::domain::position::{Position, Side};
use crate::domain::state::TimeframeState;
use crate::domain::trade::{Trade, TradeResult};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

const REQUIRED_LAG_TFS: [i64; 3] = [1, 5, 15];
const STATE_TFS: [i64; 4] = [1, 5, 15, 60];
const BASE_TF_MS: i64 = 60_000;
const LOOKBACK_MS: i64 = 24 * 60 * 60 * 1000;
const PAGE_SIZE: usize = 1000;
const CHECKPOINT_EVERY: u64 = 100;
const EQUITY_SNAPSHOT_EVERY: u64 = 10;

pub struct RunnerConfig {
    pub symbol: String,
    pub top_n: usize,
    pub balance_start: Decimal,
    pub poll_seconds: u64,
    pub safe_lag_min: i64,
    pub min_trades_before_kill: u64,
    pub kill_max_dd_pct: f64,
    pub kill_min_pf: f64,
    pub kill_min_pnl_pct: f64,
}

impl RunnerConfig {
    /// Clamps `safe_lag_min` into `[0, 10]` per spec §6.
    pub fn clamp_safe_lag(mut self) -> Self {
        self.safe_lag_min = self.safe_lag_min.clamp(0, 10);
        self
    }
}

pub struct PaperRunner {
    candle_store: Arc<dyn CandleStore>,
    paper_store: Arc<dyn PaperStore>,
    trade_store: Arc<dyn TradeStore>,
    optimizer_store: Arc<dyn OptimizerStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Option<Arc<dyn PaperMetricsSink>>,
    config: RunnerConfig,
}

impl PaperRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        candle_store: Arc<dyn CandleStore>,
        paper_store: Arc<dyn PaperStore>,
        trade_store: Arc<dyn TradeStore>,
        optimizer_store: Arc<dyn OptimizerStore>,
        notifier: Arc<dyn Notifier>,
        metrics: Option<Arc<dyn PaperMetricsSink>>,
        config: RunnerConfig,
    ) -> Self {
        Self { candle_store, paper_store, trade_store, optimizer_store, notifier, metrics, config }
    }

    /// Resumes `run_id` if given, otherwise creates a new `PaperRun`, loads
    /// the top-N configs from `optimizer_run_id`, and seeds one account per
    /// config that doesn't already have one.
    pub async fn initialize(&self, run_id: Option<Uuid>, optimizer_run_id: Uuid) -> anyhow::Result<Uuid> {
        let run_id = match run_id {
            Some(id) => {
                self.paper_store
                    .load_run(id)
                    .await?
                    .ok_or(PaperRunnerError::RunNotFound { id })?;
                id
            }
            None => {
                let id = Uuid::new_v4();
                let run = PaperRun {
                    id,
                    symbol: self.config.symbol.clone(),
                    timeframe_min: 1,
                    status: PaperRunStatus::Running,
                };
                self.paper_store.create_run(&run).await?;
                id
            }
        };

        let top = self.optimizer_store.load_top_configs(optimizer_run_id, self.config.top_n).await?;
        let existing = self.paper_store.list_paper_configs(run_id).await?;
        let existing_ranks: std::collections::HashSet<i32> = existing.iter().map(|c| c.rank).collect();

        for row in top {
            if existing_ranks.contains(&row.rank) {
                continue;
            }
            let config_id = Uuid::new_v4();
            let paper_config = PaperConfig {
                id: config_id,
                run_id,
                rank: row.rank,
                config: row.config,
                is_active: true,
                kill_reason: None,
            };
            self.paper_store.insert_paper_config(&paper_config).await?;
            let account = PaperAccount::new(run_id, config_id, self.config.balance_start);
            self.paper_store.upsert_account(&account).await?;
        }

        Ok(run_id)
    }

    /// Polls forever (spec §4.J) until `stop` is signalled. The in-flight
    /// batch always finishes before the loop exits.
    pub async fn run_until_stopped(&self, run_id: Uuid, mut stop: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut last_leaderboard_log = 0i64;
        let mut startup_cap_applied = false;

        loop {
            if *stop.borrow() {
                break;
            }

            if let Err(e) = self.tick(run_id, &mut startup_cap_applied).await {
                warn!(error = %e, "paper runner tick failed");
            }

            let now = Utc::now().timestamp_millis();
            if now - last_leaderboard_log >= 60_000 {
                if let Err(e) = self.log_leaderboard(run_id).await {
                    warn!(error = %e, "failed to log leaderboard");
                }
                last_leaderboard_log = now;
            }

            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(self.config.poll_seconds)) => {}
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }

        self.paper_store.save_run_status(run_id, PaperRunStatus::Stopped).await?;
        info!(run_id = %run_id, "paper runner stopped gracefully");
        Ok(())
    }

    async fn tick(&self, run_id: Uuid, startup_cap_applied: &mut bool) -> anyhow::Result<()> {
        let accounts = self.paper_store.list_active_accounts(run_id).await?;
        if let Some(metrics) = &self.metrics {
            metrics.set_active_accounts(accounts.len());
        }
        if accounts.is_empty() {
            return Ok(());
        }

        let safe_end = self.compute_safe_end().await?;
        let Some(safe_end) = safe_end else {
            return Ok(());
        };

        if !*startup_cap_applied {
            *startup_cap_applied = true;
            for account in &accounts {
                if let Some(last) = account.last_candle_ts {
                    if last > safe_end {
                        let mut capped = account.clone();
                        capped.last_candle_ts = Some(safe_end - BASE_TF_MS);
                        warn!(config_id = %account.paper_config_id, "capping lastCandleTs to safe end on startup");
                        self.paper_store.upsert_account(&capped).await?;
                    }
                }
            }
        }

        let configs = self.paper_store.list_paper_configs(run_id).await?;
        let config_by_id: HashMap<Uuid, PaperConfig> =
            configs.into_iter().map(|c| (c.id, c)).collect();

        for account in accounts {
            let Some(paper_config) = config_by_id.get(&account.paper_config_id) else {
                continue;
            };
            if !paper_config.is_active {
                continue;
            }
            if let Err(e) = self.process_account(account, paper_config, safe_end).await {
                warn!(config_id = %paper_config.id, error = %e, "account processing failed");
            }
        }

        Ok(())
    }

    /// `safeEnd = min over tf in {1,5,15} of (maxTs[tf] - safe_lag_min * tf * 60s)`.
    /// Returns `None` if any required timeframe has no stored candles yet.
    async fn compute_safe_end(&self) -> anyhow::Result<Option<i64>> {
        let mut safe_end: Option<i64> = None;
        for &tf in REQUIRED_LAG_TFS.iter() {
            let max_ts = self.candle_store.max_ts(&self.config.symbol, tf).await?;
            let Some(max_ts) = max_ts else {
                return Ok(None);
            };
            let candidate = max_ts - self.config.safe_lag_min * tf * BASE_TF_MS;
            safe_end = Some(match safe_end {
                Some(current) => current.min(candidate),
                None => candidate,
            });
        }
        Ok(safe_end)
    }

    async fn process_account(
        &self,
        mut account: PaperAccount,
        paper_config: &PaperConfig,
        safe_end: i64,
    ) -> anyhow::Result<()> {
        let start = match account.last_candle_ts {
            Some(ts) => ts + BASE_TF_MS,
            None => safe_end - LOOKBACK_MS,
        };
        if start >= safe_end {
            return Ok(());
        }

        let mut series = LiveSeries::seed(&self.candle_store, &self.config.symbol, start).await?;
        let mut candles_processed = 0u64;
        let mut cursor = start;
        let mut killed = false;

        while cursor < safe_end && !killed {
            let page_end = (cursor + PAGE_SIZE as i64 * BASE_TF_MS).min(safe_end);
            let page = self
                .candle_store
                .range(&self.config.symbol, 1, cursor, page_end, Some(PAGE_SIZE))
                .await?;
            if page.is_empty() {
                break;
            }

            let mut last_processed_ts = None;
            for candle in &page {
                // `range` is inclusive of `page_end`, which is also the next
                // page's `cursor` — skip a candle already processed as the
                // tail of this page so it isn't replayed as the next page's
                // head (spec §4.J: lastCandleTs strictly increasing).
                if account.last_candle_ts.is_some_and(|last| candle.ts <= last) {
                    continue;
                }

                series.advance(&self.candle_store, candle).await?;
                let cache = series.cache();

                self.step_candle(&mut account, paper_config, candle, &cache).await?;
                account.last_candle_ts = Some(candle.ts);
                last_processed_ts = Some(candle.ts);
                candles_processed += 1;

                if candles_processed % CHECKPOINT_EVERY == 0 {
                    self.paper_store.upsert_account(&account).await?;
                }
                if candles_processed % EQUITY_SNAPSHOT_EVERY == 0 {
                    self.snapshot_equity(&account, candle.ts).await?;
                }

                if account.trades_count >= self.config.min_trades_before_kill {
                    if let Some((reason_kind, reason)) = self.kill_reason(&account) {
                        self.apply_kill(paper_config.id, &account, reason_kind, &reason).await?;
                        killed = true;
                        break;
                    }
                }
            }
            cursor = match last_processed_ts {
                Some(last) => last + BASE_TF_MS,
                None => page_end + BASE_TF_MS,
            };
        }

        if candles_processed > 0 {
            self.paper_store.upsert_account(&account).await?;
        }
        Ok(())
    }

    async fn step_candle(
        &self,
        account: &mut PaperAccount,
        paper_config: &PaperConfig,
        candle: &Candle,
        cache: &StateCache<'_>,
    ) -> anyhow::Result<()> {
        let cfg = &paper_config.config;

        for side in [Side::Long, Side::Short] {
            if let Some(pos) = account.open_positions.get(side).cloned() {
                if let Some((exit_px, reason)) = check_exit(&pos, candle) {
                    self.close_position_on_account(account, paper_config.id, side, &pos, exit_px, cfg.taker_fee_bps, cfg.slippage_bps, candle.ts, reason)
                        .await?;
                }
            }
        }

        let mark_price = candle.close;
        account.equity = mark_to_market(account.balance, &account.open_positions, mark_price);
        let update = update_equity_and_dd(account.equity, account.max_equity);
        account.max_equity = update.max_equity;
        account.max_drawdown_pct = account.max_drawdown_pct.max(update.dd_pct);

        if let Some(signal) = evaluate(cache, candle, cfg) {
            if account.open_positions.get(signal.direction).is_some() {
                tracing::debug!(config_id = %paper_config.id, side = ?signal.direction, "signal direction already open, ignoring");
                return Ok(());
            }
            let risk_pct = cfg.min_risk_pct.max(dec!(0.0001));
            match crate::application::paper_engine::open_position(
                signal.direction,
                account.equity,
                risk_pct,
                signal.entry,
                signal.sl,
                signal.tp,
                candle.ts,
                cfg.taker_fee_bps,
                cfg.slippage_bps,
            ) {
                Ok(mut position) => {
                    let notional = position.entry * position.size;
                    account.balance -= position.fees_paid;
                    let trade = Trade {
                        id: Uuid::new_v4(),
                        run_id: account.run_id,
                        config_id: paper_config.id,
                        opened_at: candle.ts,
                        side: position.side,
                        entry: position.entry,
                        size: position.size,
                        sl: position.stop_loss,
                        tp: position.take_profit,
                        closed_at: None,
                        exit: None,
                        pnl_pct: None,
                        pnl_abs: None,
                        fees_abs: None,
                        result: None,
                        meta: serde_json::json!({ "notional": notional.to_string() }),
                    };
                    let persisted = self.trade_store.insert_trade(trade).await?;
                    position.trade_id = Some(persisted.id);
                    account.open_positions.set(signal.direction, Some(position));
                }
                Err(e) => warn!(error = %e, "failed to size position, skipping signal"),
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn close_position_on_account(
        &self,
        account: &mut PaperAccount,
        config_id: Uuid,
        side: Side,
        pos: &Position,
        exit_px: Decimal,
        fee_bps: i64,
        slippage_bps: i64,
        closed_at: i64,
        reason: &'static str,
    ) -> anyhow::Result<()> {
        let fill_exit = apply_exit_slippage(exit_px, pos.side, slippage_bps);
        let exit_notional = fill_exit * pos.size;
        let exit_fees = calc_fees(exit_notional, fee_bps);
        let raw_pnl = match pos.side {
            Side::Long => (fill_exit - pos.entry) * pos.size,
            Side::Short => (pos.entry - fill_exit) * pos.size,
        };
        let pnl_abs = raw_pnl - exit_fees;
        let entry_notional = pos.entry * pos.size;
        let pnl_pct = if entry_notional.is_zero() {
            0.0
        } else {
            (pnl_abs / entry_notional * dec!(100)).to_f64().unwrap_or(0.0)
        };
        let result = if pnl_pct > 0.01 {
            TradeResult::Win
        } else if pnl_pct < -0.01 {
            TradeResult::Loss
        } else {
            TradeResult::Breakeven
        };

        account.balance += pnl_abs;
        account.trades_count += 1;
        match result {
            TradeResult::Win => {
                account.wins_count += 1;
                account.gross_wins += pnl_abs.max(Decimal::ZERO);
            }
            TradeResult::Loss => {
                account.losses_count += 1;
                account.gross_losses += (-pnl_abs).max(Decimal::ZERO);
            }
            TradeResult::Breakeven => {}
        }
        account.profit_factor = if account.gross_losses > Decimal::ZERO {
            (account.gross_wins / account.gross_losses).to_f64().unwrap_or(0.0)
        } else if account.gross_wins > Decimal::ZERO {
            f64::INFINITY
        } else {
            0.0
        };
        account.open_positions.set(side, None);

        if let Some(trade_id) = pos.trade_id {
            self.trade_store
                .close_trade(
                    trade_id,
                    closed_at,
                    fill_exit,
                    pnl_pct,
                    pnl_abs,
                    exit_fees,
                    result,
                    serde_json::json!({ "exit_reason": reason }),
                )
                .await?;
        }
        let _ = config_id;
        Ok(())
    }

    /// Returns the metric label kind alongside the human-readable reason.
    fn kill_reason(&self, account: &PaperAccount) -> Option<(&'static str, String)> {
        if account.max_drawdown_pct > self.config.kill_max_dd_pct {
            return Some(("drawdown", format!("max_drawdown_pct {:.2} > limit {:.2}", account.max_drawdown_pct, self.config.kill_max_dd_pct)));
        }
        if account.profit_factor < self.config.kill_min_pf {
            return Some(("profit_factor", format!("profit_factor {:.2} < limit {:.2}", account.profit_factor, self.config.kill_min_pf)));
        }
        let realized = account.realized_pnl_pct();
        if realized < self.config.kill_min_pnl_pct {
            return Some(("pnl", format!("realized_pnl_pct {:.2} < limit {:.2}", realized, self.config.kill_min_pnl_pct)));
        }
        None
    }

    async fn apply_kill(&self, config_id: Uuid, account: &PaperAccount, reason_kind: &str, reason: &str) -> anyhow::Result<()> {
        warn!(config_id = %config_id, reason, "kill rule triggered, deactivating config");
        self.paper_store.set_config_active(config_id, false, Some(reason.to_string())).await?;
        if let Some(metrics) = &self.metrics {
            metrics.record_kill(reason_kind);
        }
        let payload = serde_json::json!({
            "config_id": config_id,
            "reason": reason,
            "equity": account.equity.to_string(),
            "trades_count": account.trades_count,
        });
        if let Err(e) = self
            .paper_store
            .insert_event(&PaperEvent {
                run_id: account.run_id,
                config_id: Some(config_id),
                event: "paper_config_killed".to_string(),
                payload: payload.clone(),
                created_at: Utc::now().timestamp_millis(),
            })
            .await
        {
            warn!(config_id = %config_id, error = %e, "failed to append paper event");
        }
        self.notifier.notify("paper_config_killed", payload).await?;
        Ok(())
    }

    async fn snapshot_equity(&self, account: &PaperAccount, ts: i64) -> anyhow::Result<()> {
        let snapshot = EquitySnapshot {
            run_id: account.run_id,
            config_id: account.paper_config_id,
            ts,
            equity: account.equity,
            balance: account.balance,
            dd_pct: account.max_drawdown_pct,
        };
        self.paper_store.insert_equity_snapshot(&snapshot).await
    }

    async fn log_leaderboard(&self, run_id: Uuid) -> anyhow::Result<()> {
        let mut accounts = self.paper_store.list_active_accounts(run_id).await?;
        accounts.sort_by(|a, b| b.equity.cmp(&a.equity));
        for (i, account) in accounts.iter().take(5).enumerate() {
            let rank = (i + 1) as i32;
            info!(rank, config_id = %account.paper_config_id, equity = %account.equity, dd_pct = account.max_drawdown_pct, "leaderboard");
            if let Some(metrics) = &self.metrics {
                metrics.set_account_equity(rank, account.equity.to_f64().unwrap_or(0.0));
                metrics.set_account_drawdown(rank, account.max_drawdown_pct);
            }
        }
        Ok(())
    }
}

/// Per-account rolling multi-timeframe state, rebuilt incrementally as live
/// candles arrive. The 1-minute state is rebuilt every candle from an
/// in-memory rolling window; higher timeframes are only refreshed near
/// their own boundary (mirroring `application::backtest::refresh_states`),
/// queried fresh from the store since live data isn't preloaded per account.
struct LiveSeries {
    symbol: String,
    candles_1m: Vec<Candle>,
    states: HashMap<i64, Option<TimeframeState>>,
}

impl LiveSeries {
    async fn seed(store: &Arc<dyn CandleStore>, symbol: &str, start: i64) -> anyhow::Result<Self> {
        let mut states = HashMap::new();
        let mut candles_1m = Vec::new();
        for &tf in STATE_TFS.iter() {
            let seed_start = start - LOOKBACK_MS;
            let seed = store.range(symbol, tf, seed_start, start - 1, None).await?;
            if tf == 1 {
                candles_1m = seed.clone();
            }
            let state = if seed.is_empty() { None } else { build_state(symbol, tf, &seed) };
            states.insert(tf, state);
        }
        Ok(Self { symbol: symbol.to_string(), candles_1m, states })
    }

    fn cache(&self) -> StateCache<'_> {
        StateCache {
            state_1m: self.states.get(&1).and_then(|s| s.as_ref()),
            state_5m: self.states.get(&5).and_then(|s| s.as_ref()),
            state_15m: self.states.get(&15).and_then(|s| s.as_ref()),
            state_60m: self.states.get(&60).and_then(|s| s.as_ref()),
        }
    }

    async fn advance(&mut self, store: &Arc<dyn CandleStore>, candle: &Candle) -> anyhow::Result<()> {
        self.candles_1m.push(candle.clone());
        let cutoff = candle.ts - LOOKBACK_MS;
        self.candles_1m.retain(|c| c.ts >= cutoff);
        self.states.insert(1, build_state(&self.symbol, 1, &self.candles_1m));

        for &tf in [5i64, 15, 60].iter() {
            if candle.ts % (tf * BASE_TF_MS) >= BASE_TF_MS {
                continue;
            }
            let window_start = candle.ts - LOOKBACK_MS;
            let window = store.range(&self.symbol, tf, window_start, candle.ts, None).await?;
            if !window.is_empty() {
                self.states.insert(tf, build_state(&self.symbol, tf, &window));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(dd: f64, pf: f64, balance_start: Decimal, balance: Decimal) -> PaperAccount {
        let mut a = PaperAccount::new(Uuid::new_v4(), Uuid::new_v4(), balance_start);
        a.balance = balance;
        a.max_drawdown_pct = dd;
        a.profit_factor = pf;
        a
    }

    fn runner_config() -> RunnerConfig {
        RunnerConfig {
            symbol: "BTC-PERPETUAL".into(),
            top_n: 10,
            balance_start: dec!(1000),
            poll_seconds: 15,
            safe_lag_min: 1,
            min_trades_before_kill: 50,
            kill_max_dd_pct: 12.0,
            kill_min_pf: 0.8,
            kill_min_pnl_pct: -2.0,
        }
        .clamp_safe_lag()
    }

    struct NullNotifier;
    #[async_trait::async_trait]
    impl Notifier for NullNotifier {
        async fn notify(&self, _event: &str, _payload: serde_json::Value) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn kill_rule_fires_on_drawdown() {
        let runner = PaperRunner {
            candle_store: Arc::new(NoopStore),
            paper_store: Arc::new(NoopStore),
            trade_store: Arc::new(NoopStore),
            optimizer_store: Arc::new(NoopStore),
            notifier: Arc::new(NullNotifier),
            metrics: None,
            config: runner_config(),
        };
        let acc = account(15.0, 2.0, dec!(1000), dec!(1000));
        let (kind, _) = runner.kill_reason(&acc).unwrap();
        assert_eq!(kind, "drawdown");
    }

    #[test]
    fn kill_rule_fires_on_low_profit_factor() {
        let runner = PaperRunner {
            candle_store: Arc::new(NoopStore),
            paper_store: Arc::new(NoopStore),
            trade_store: Arc::new(NoopStore),
            optimizer_store: Arc::new(NoopStore),
            notifier: Arc::new(NullNotifier),
            metrics: None,
            config: runner_config(),
        };
        let acc = account(1.0, 0.5, dec!(1000), dec!(1000));
        let (kind, _) = runner.kill_reason(&acc).unwrap();
        assert_eq!(kind, "profit_factor");
    }

    #[test]
    fn no_kill_when_healthy() {
        let runner = PaperRunner {
            candle_store: Arc::new(NoopStore),
            paper_store: Arc::new(NoopStore),
            trade_store: Arc::new(NoopStore),
            optimizer_store: Arc::new(NoopStore),
            notifier: Arc::new(NullNotifier),
            metrics: None,
            config: runner_config(),
        };
        let acc = account(1.0, 2.0, dec!(1000), dec!(1050));
        assert!(runner.kill_reason(&acc).is_none());
    }

    struct NoopStore;

    #[async_trait::async_trait]
    impl CandleStore for NoopStore {
        async fn upsert_many(&self, _candles: &[Candle]) -> anyhow::Result<usize> {
            Ok(0)
        }
        async fn max_ts(&self, _symbol: &str, _tf: i64) -> anyhow::Result<Option<i64>> {
            Ok(None)
        }
        async fn range(&self, _symbol: &str, _tf: i64, _start: i64, _end: i64, _limit: Option<usize>) -> anyhow::Result<Vec<Candle>> {
            Ok(vec![])
        }
    }

    #[async_trait::async_trait]
    impl PaperStore for NoopStore {
        async fn load_run(&self, _id: Uuid) -> anyhow::Result<Option<PaperRun>> {
            Ok(None)
        }
        async fn create_run(&self, _run: &PaperRun) -> anyhow::Result<()> {
            Ok(())
        }
        async fn save_run_status(&self, _id: Uuid, _status: PaperRunStatus) -> anyhow::Result<()> {
            Ok(())
        }
        async fn insert_paper_config(&self, _cfg: &PaperConfig) -> anyhow::Result<()> {
            Ok(())
        }
        async fn list_paper_configs(&self, _run_id: Uuid) -> anyhow::Result<Vec<PaperConfig>> {
            Ok(vec![])
        }
        async fn set_config_active(&self, _id: Uuid, _is_active: bool, _kill_reason: Option<String>) -> anyhow::Result<()> {
            Ok(())
        }
        async fn upsert_account(&self, _account: &PaperAccount) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_account(&self, _run_id: Uuid, _config_id: Uuid) -> anyhow::Result<Option<PaperAccount>> {
            Ok(None)
        }
        async fn list_active_accounts(&self, _run_id: Uuid) -> anyhow::Result<Vec<PaperAccount>> {
            Ok(vec![])
        }
        async fn insert_equity_snapshot(&self, _snapshot: &EquitySnapshot) -> anyhow::Result<()> {
            Ok(())
        }
        async fn insert_event(&self, _event: &PaperEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl TradeStore for NoopStore {
        async fn insert_trade(&self, trade: Trade) -> anyhow::Result<Trade> {
            Ok(trade)
        }
        async fn close_trade(
            &self,
            _id: Uuid,
            _closed_at: i64,
            _exit: Decimal,
            _pnl_pct: f64,
            _pnl_abs: Decimal,
            _fees_abs: Decimal,
            _result: TradeResult,
            _meta: serde_json::Value,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl OptimizerStore for NoopStore {
        async fn create_run(&self, _run: &crate::domain::optimizer_run::OptimizerRun) -> anyhow::Result<()> {
            Ok(())
        }
        async fn patch_run_counts(&self, _run_id: Uuid, _total: usize, _valid: usize) -> anyhow::Result<()> {
            Ok(())
        }
        async fn save_top_configs(&self, _rows: &[crate::domain::optimizer_run::TopConfig]) -> anyhow::Result<()> {
            Ok(())
        }
        async fn save_all_configs(&self, _rows: &[crate::domain::optimizer_run::AllConfigResult]) -> anyhow::Result<()> {
            Ok(())
        }
        async fn save_oos_results(&self, _rows: &[crate::domain::optimizer_run::OosResult]) -> anyhow::Result<()> {
            Ok(())
        }
        async fn load_top_configs(&self, _run_id: Uuid, _top_n: usize) -> anyhow::Result<Vec<crate::domain::optimizer_run::TopConfig>> {
            Ok(vec![])
        }
    }
}
