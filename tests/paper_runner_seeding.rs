//! Exercises `PaperRunner::initialize` against in-memory mock stores: one
//! account per ranked config, and re-initializing an existing run must not
//! duplicate accounts (spec §4.J).

use async_trait::async_trait;
use perpbot::application::paper_runner::{PaperRunner, RunnerConfig};
use perpbot::domain::candle::Candle;
use perpbot::domain::optimizer_run::{AllConfigResult, BacktestMetrics, OosResult, OptimizerRun, TopConfig};
use perpbot::domain::paper::{EquitySnapshot, PaperAccount, PaperConfig, PaperEvent, PaperRun, PaperRunStatus};
use perpbot::domain::ports::{CandleStore, Notifier, OptimizerStore, PaperStore, TradeStore};
use perpbot::domain::strategy_config::StrategyConfig;
use perpbot::domain::trade::{Trade, TradeResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct InMemoryStore {
    top_configs: Mutex<HashMap<Uuid, Vec<TopConfig>>>,
    runs: Mutex<HashMap<Uuid, PaperRun>>,
    configs: Mutex<HashMap<Uuid, Vec<PaperConfig>>>,
    accounts: Mutex<HashMap<(Uuid, Uuid), PaperAccount>>,
}

#[async_trait]
impl CandleStore for InMemoryStore {
    async fn upsert_many(&self, _candles: &[Candle]) -> anyhow::Result<usize> {
        Ok(0)
    }
    async fn max_ts(&self, _symbol: &str, _timeframe_min: i64) -> anyhow::Result<Option<i64>> {
        Ok(None)
    }
    async fn range(&self, _symbol: &str, _timeframe_min: i64, _start_ts: i64, _end_ts: i64, _limit: Option<usize>) -> anyhow::Result<Vec<Candle>> {
        Ok(vec![])
    }
}

#[async_trait]
impl TradeStore for InMemoryStore {
    async fn insert_trade(&self, trade: Trade) -> anyhow::Result<Trade> {
        Ok(trade)
    }
    #[allow(clippy::too_many_arguments)]
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

#[async_trait]
impl OptimizerStore for InMemoryStore {
    async fn create_run(&self, _run: &OptimizerRun) -> anyhow::Result<()> {
        Ok(())
    }
    async fn patch_run_counts(&self, _run_id: Uuid, _total_configs: usize, _valid_configs: usize) -> anyhow::Result<()> {
        Ok(())
    }
    async fn save_top_configs(&self, _rows: &[TopConfig]) -> anyhow::Result<()> {
        Ok(())
    }
    async fn save_all_configs(&self, _rows: &[AllConfigResult]) -> anyhow::Result<()> {
        Ok(())
    }
    async fn save_oos_results(&self, _rows: &[OosResult]) -> anyhow::Result<()> {
        Ok(())
    }
    async fn load_top_configs(&self, run_id: Uuid, top_n: usize) -> anyhow::Result<Vec<TopConfig>> {
        let rows = self.top_configs.lock().unwrap().get(&run_id).cloned().unwrap_or_default();
        Ok(rows.into_iter().take(top_n).collect())
    }
}

#[async_trait]
impl PaperStore for InMemoryStore {
    async fn load_run(&self, id: Uuid) -> anyhow::Result<Option<PaperRun>> {
        Ok(self.runs.lock().unwrap().get(&id).cloned())
    }
    async fn create_run(&self, run: &PaperRun) -> anyhow::Result<()> {
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(())
    }
    async fn save_run_status(&self, id: Uuid, status: PaperRunStatus) -> anyhow::Result<()> {
        if let Some(run) = self.runs.lock().unwrap().get_mut(&id) {
            run.status = status;
        }
        Ok(())
    }
    async fn insert_paper_config(&self, cfg: &PaperConfig) -> anyhow::Result<()> {
        self.configs.lock().unwrap().entry(cfg.run_id).or_default().push(cfg.clone());
        Ok(())
    }
    async fn list_paper_configs(&self, run_id: Uuid) -> anyhow::Result<Vec<PaperConfig>> {
        Ok(self.configs.lock().unwrap().get(&run_id).cloned().unwrap_or_default())
    }
    async fn set_config_active(&self, id: Uuid, is_active: bool, kill_reason: Option<String>) -> anyhow::Result<()> {
        for configs in self.configs.lock().unwrap().values_mut() {
            if let Some(cfg) = configs.iter_mut().find(|c| c.id == id) {
                cfg.is_active = is_active;
                cfg.kill_reason = kill_reason;
                break;
            }
        }
        Ok(())
    }
    async fn upsert_account(&self, account: &PaperAccount) -> anyhow::Result<()> {
        self.accounts.lock().unwrap().insert((account.run_id, account.paper_config_id), account.clone());
        Ok(())
    }
    async fn get_account(&self, run_id: Uuid, config_id: Uuid) -> anyhow::Result<Option<PaperAccount>> {
        Ok(self.accounts.lock().unwrap().get(&(run_id, config_id)).cloned())
    }
    async fn list_active_accounts(&self, run_id: Uuid) -> anyhow::Result<Vec<PaperAccount>> {
        Ok(self.accounts.lock().unwrap().values().filter(|a| a.run_id == run_id).cloned().collect())
    }
    async fn insert_equity_snapshot(&self, _snapshot: &EquitySnapshot) -> anyhow::Result<()> {
        Ok(())
    }
    async fn insert_event(&self, _event: &PaperEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _event: &str, _payload: serde_json::Value) -> anyhow::Result<()> {
        Ok(())
    }
}

fn top_config(run_id: Uuid, rank: i32) -> TopConfig {
    TopConfig {
        run_id,
        rank,
        score: 1.0,
        config: StrategyConfig::baseline(),
        metrics: BacktestMetrics {
            trades: 10,
            wins: 6,
            losses: 4,
            winrate: 60.0,
            total_pnl_pct: 5.0,
            expectancy_pct: 0.5,
            profit_factor: 1.5,
            max_drawdown_pct: 3.0,
            avg_duration_min: 20.0,
        },
    }
}

fn runner_config() -> RunnerConfig {
    RunnerConfig {
        symbol: "BTC-PERPETUAL".to_string(),
        top_n: 3,
        balance_start: dec!(1000),
        poll_seconds: 5,
        safe_lag_min: 1,
        min_trades_before_kill: 50,
        kill_max_dd_pct: 12.0,
        kill_min_pf: 0.8,
        kill_min_pnl_pct: -2.0,
    }
}

#[tokio::test]
async fn initialize_seeds_one_account_per_ranked_config() {
    let store = Arc::new(InMemoryStore::default());
    let optimizer_run_id = Uuid::new_v4();
    store
        .top_configs
        .lock()
        .unwrap()
        .insert(optimizer_run_id, vec![top_config(optimizer_run_id, 1), top_config(optimizer_run_id, 2), top_config(optimizer_run_id, 3)]);

    let runner = PaperRunner::new(store.clone(), store.clone(), store.clone(), store.clone(), Arc::new(NullNotifier), None, runner_config());

    let run_id = runner.initialize(None, optimizer_run_id).await.unwrap();

    let configs = store.list_paper_configs(run_id).await.unwrap();
    assert_eq!(configs.len(), 3);
    let accounts = store.list_active_accounts(run_id).await.unwrap();
    assert_eq!(accounts.len(), 3);
    assert!(accounts.iter().all(|a| a.balance_start == dec!(1000)));
}

#[tokio::test]
async fn reinitializing_an_existing_run_does_not_duplicate_accounts() {
    let store = Arc::new(InMemoryStore::default());
    let optimizer_run_id = Uuid::new_v4();
    store
        .top_configs
        .lock()
        .unwrap()
        .insert(optimizer_run_id, vec![top_config(optimizer_run_id, 1), top_config(optimizer_run_id, 2)]);

    let runner = PaperRunner::new(store.clone(), store.clone(), store.clone(), store.clone(), Arc::new(NullNotifier), None, runner_config());

    let run_id = runner.initialize(None, optimizer_run_id).await.unwrap();
    runner.initialize(Some(run_id), optimizer_run_id).await.unwrap();

    let configs = store.list_paper_configs(run_id).await.unwrap();
    assert_eq!(configs.len(), 2, "re-running initialize for an existing rank must not insert a second config row");
}
