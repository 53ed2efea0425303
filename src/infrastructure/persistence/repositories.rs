//! SQLite-backed implementations of the `domain::ports` traits.

use crate::domain::candle::Candle;
use crate::domain::optimizer_run::{AllConfigResult, BacktestMetrics, OosResult, OptimizerRun, TopConfig};
use crate::domain::paper::{EquitySnapshot, PaperAccount, PaperConfig, PaperEvent, PaperRun, PaperRunStatus};
use crate::domain::ports::{CandleStore, OptimizerStore, PaperStore, StateStore, TradeStore};
use crate::domain::position::{OpenPositions, Side};
use crate::domain::state::TimeframeState;
use crate::domain::trade::{Trade, TradeResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

fn dec_from(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

fn side_to_str(side: Side) -> &'static str {
    match side {
        Side::Long => "long",
        Side::Short => "short",
    }
}

fn side_from_str(s: &str) -> Side {
    match s {
        "short" => Side::Short,
        _ => Side::Long,
    }
}

fn result_to_str(result: TradeResult) -> &'static str {
    match result {
        TradeResult::Win => "win",
        TradeResult::Loss => "loss",
        TradeResult::Breakeven => "breakeven",
    }
}

fn result_from_str(s: &str) -> TradeResult {
    match s {
        "win" => TradeResult::Win,
        "loss" => TradeResult::Loss,
        _ => TradeResult::Breakeven,
    }
}

fn status_to_str(status: PaperRunStatus) -> &'static str {
    match status {
        PaperRunStatus::Running => "running",
        PaperRunStatus::Stopped => "stopped",
        PaperRunStatus::Finished => "finished",
    }
}

fn status_from_str(s: &str) -> PaperRunStatus {
    match s {
        "stopped" => PaperRunStatus::Stopped,
        "finished" => PaperRunStatus::Finished,
        _ => PaperRunStatus::Running,
    }
}

pub struct SqliteCandleStore {
    pool: SqlitePool,
}

impl SqliteCandleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandleStore for SqliteCandleStore {
    async fn upsert_many(&self, candles: &[Candle]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for c in candles {
            sqlx::query(
                r#"
                INSERT INTO candles (symbol, timeframe_min, ts, open, high, low, close, volume, source)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, timeframe_min, ts) DO UPDATE SET
                    open = excluded.open, high = excluded.high, low = excluded.low,
                    close = excluded.close, volume = excluded.volume, source = excluded.source
                "#,
            )
            .bind(&c.symbol)
            .bind(c.timeframe_min)
            .bind(c.ts)
            .bind(c.open.to_string())
            .bind(c.high.to_string())
            .bind(c.low.to_string())
            .bind(c.close.to_string())
            .bind(c.volume.to_string())
            .bind(&c.source)
            .execute(&mut *tx)
            .await
            .context("failed to upsert candle")?;
        }
        tx.commit().await?;
        Ok(candles.len())
    }

    async fn max_ts(&self, symbol: &str, timeframe_min: i64) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT MAX(ts) as max_ts FROM candles WHERE symbol = ? AND timeframe_min = ?")
            .bind(symbol)
            .bind(timeframe_min)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<Option<i64>, _>("max_ts")?)
    }

    async fn range(&self, symbol: &str, timeframe_min: i64, start_ts: i64, end_ts: i64, limit: Option<usize>) -> Result<Vec<Candle>> {
        let limit = limit.unwrap_or(i64::MAX as usize) as i64;
        let rows = sqlx::query(
            "SELECT * FROM candles WHERE symbol = ? AND timeframe_min = ? AND ts >= ? AND ts <= ? ORDER BY ts ASC LIMIT ?",
        )
        .bind(symbol)
        .bind(timeframe_min)
        .bind(start_ts)
        .bind(end_ts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            candles.push(Candle {
                symbol: row.try_get("symbol")?,
                timeframe_min: row.try_get("timeframe_min")?,
                ts: row.try_get("ts")?,
                open: dec_from(&row.try_get::<String, _>("open")?),
                high: dec_from(&row.try_get::<String, _>("high")?),
                low: dec_from(&row.try_get::<String, _>("low")?),
                close: dec_from(&row.try_get::<String, _>("close")?),
                volume: dec_from(&row.try_get::<String, _>("volume")?),
                source: row.try_get("source")?,
            });
        }
        Ok(candles)
    }
}

pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn upsert(&self, state: &TimeframeState) -> Result<()> {
        let state_json = serde_json::to_string(state).context("failed to serialize timeframe state")?;
        sqlx::query(
            r#"
            INSERT INTO timeframe_state (symbol, timeframe_min, ts, state_json)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(symbol, timeframe_min, ts) DO UPDATE SET state_json = excluded.state_json
            "#,
        )
        .bind(&state.symbol)
        .bind(state.timeframe_min)
        .bind(state.ts)
        .bind(state_json)
        .execute(&self.pool)
        .await
        .context("failed to upsert timeframe state")?;
        Ok(())
    }

    async fn latest(&self, symbol: &str, timeframe_min: i64) -> Result<Option<TimeframeState>> {
        let row = sqlx::query(
            "SELECT state_json FROM timeframe_state WHERE symbol = ? AND timeframe_min = ? ORDER BY ts DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(timeframe_min)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("state_json")?;
                Ok(Some(serde_json::from_str(&json).context("failed to deserialize timeframe state")?))
            }
            None => Ok(None),
        }
    }
}

pub struct SqliteTradeStore {
    pool: SqlitePool,
}

impl SqliteTradeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn insert_trade(&self, trade: Trade) -> Result<Trade> {
        let existing = sqlx::query(
            "SELECT id FROM paper_trades WHERE run_id = ? AND config_id = ? AND opened_at = ? AND side = ? AND entry = ?",
        )
        .bind(trade.run_id.to_string())
        .bind(trade.config_id.to_string())
        .bind(trade.opened_at)
        .bind(side_to_str(trade.side))
        .bind(trade.entry.to_string())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            let id: String = row.try_get("id")?;
            return self.load_by_id(Uuid::parse_str(&id)?).await;
        }

        sqlx::query(
            r#"
            INSERT INTO paper_trades (id, run_id, config_id, opened_at, side, entry, size, sl, tp, meta_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade.id.to_string())
        .bind(trade.run_id.to_string())
        .bind(trade.config_id.to_string())
        .bind(trade.opened_at)
        .bind(side_to_str(trade.side))
        .bind(trade.entry.to_string())
        .bind(trade.size.to_string())
        .bind(trade.sl.to_string())
        .bind(trade.tp.to_string())
        .bind(trade.meta.to_string())
        .execute(&self.pool)
        .await
        .context("failed to insert trade")?;

        Ok(trade)
    }

    async fn close_trade(
        &self,
        id: Uuid,
        closed_at: i64,
        exit: Decimal,
        pnl_pct: f64,
        pnl_abs: Decimal,
        fees_abs: Decimal,
        result: TradeResult,
        meta: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE paper_trades SET
                closed_at = ?, exit = ?, pnl_pct = ?, pnl_abs = ?, fees_abs = ?, result = ?, meta_json = ?
            WHERE id = ?
            "#,
        )
        .bind(closed_at)
        .bind(exit.to_string())
        .bind(pnl_pct)
        .bind(pnl_abs.to_string())
        .bind(fees_abs.to_string())
        .bind(result_to_str(result))
        .bind(meta.to_string())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("failed to close trade")?;
        Ok(())
    }
}

impl SqliteTradeStore {
    async fn load_by_id(&self, id: Uuid) -> Result<Trade> {
        let row = sqlx::query("SELECT * FROM paper_trades WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("trade not found after idempotent conflict")?;
        row_to_trade(row)
    }
}

fn row_to_trade(row: sqlx::sqlite::SqliteRow) -> Result<Trade> {
    let side_str: String = row.try_get("side")?;
    let result_str: Option<String> = row.try_get("result")?;
    let meta_str: String = row.try_get("meta_json")?;
    Ok(Trade {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
        run_id: Uuid::parse_str(&row.try_get::<String, _>("run_id")?)?,
        config_id: Uuid::parse_str(&row.try_get::<String, _>("config_id")?)?,
        opened_at: row.try_get("opened_at")?,
        side: side_from_str(&side_str),
        entry: dec_from(&row.try_get::<String, _>("entry")?),
        size: dec_from(&row.try_get::<String, _>("size")?),
        sl: dec_from(&row.try_get::<String, _>("sl")?),
        tp: dec_from(&row.try_get::<String, _>("tp")?),
        closed_at: row.try_get("closed_at")?,
        exit: row.try_get::<Option<String>, _>("exit")?.map(|s| dec_from(&s)),
        pnl_pct: row.try_get("pnl_pct")?,
        pnl_abs: row.try_get::<Option<String>, _>("pnl_abs")?.map(|s| dec_from(&s)),
        fees_abs: row.try_get::<Option<String>, _>("fees_abs")?.map(|s| dec_from(&s)),
        result: result_str.map(|s| result_from_str(&s)),
        meta: serde_json::from_str(&meta_str).unwrap_or(serde_json::Value::Null),
    })
}

pub struct SqliteOptimizerStore {
    pool: SqlitePool,
}

impl SqliteOptimizerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OptimizerStore for SqliteOptimizerStore {
    async fn create_run(&self, run: &OptimizerRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO optimizer_runs (id, symbol, train_start_ts, train_end_ts, dd_limit_pct, total_configs, valid_configs)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.id.to_string())
        .bind(&run.symbol)
        .bind(run.train_start_ts)
        .bind(run.train_end_ts)
        .bind(run.dd_limit_pct)
        .bind(run.total_configs as i64)
        .bind(run.valid_configs as i64)
        .execute(&self.pool)
        .await
        .context("failed to create optimizer run")?;
        Ok(())
    }

    async fn patch_run_counts(&self, run_id: Uuid, total_configs: usize, valid_configs: usize) -> Result<()> {
        sqlx::query("UPDATE optimizer_runs SET total_configs = ?, valid_configs = ? WHERE id = ?")
            .bind(total_configs as i64)
            .bind(valid_configs as i64)
            .bind(run_id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to patch optimizer run counts")?;
        Ok(())
    }

    async fn save_top_configs(&self, rows: &[TopConfig]) -> Result<()> {
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO optimizer_run_top_configs (run_id, rank, score, config_json, metrics_json)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(run_id, rank) DO UPDATE SET
                    score = excluded.score, config_json = excluded.config_json, metrics_json = excluded.metrics_json
                "#,
            )
            .bind(row.run_id.to_string())
            .bind(row.rank)
            .bind(row.score)
            .bind(serde_json::to_string(&row.config)?)
            .bind(serde_json::to_string(&row.metrics)?)
            .execute(&self.pool)
            .await
            .context("failed to save top config row")?;
        }
        Ok(())
    }

    async fn save_all_configs(&self, rows: &[AllConfigResult]) -> Result<()> {
        for row in rows {
            let config_json = serde_json::to_string(&row.config)?;
            sqlx::query(
                r#"
                INSERT INTO optimizer_run_configs (run_id, config_json, score, metrics_json)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(run_id, config_json) DO UPDATE SET
                    score = excluded.score, metrics_json = excluded.metrics_json
                "#,
            )
            .bind(row.run_id.to_string())
            .bind(&config_json)
            .bind(row.score)
            .bind(row.metrics.as_ref().map(serde_json::to_string).transpose()?)
            .execute(&self.pool)
            .await
            .context("failed to save all-config row")?;
        }
        Ok(())
    }

    async fn save_oos_results(&self, rows: &[OosResult]) -> Result<()> {
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO optimizer_oos_results (run_id, rank, symbol, window_start_ts, window_end_ts, metrics_json, stability_warning)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(run_id, rank) DO UPDATE SET
                    metrics_json = excluded.metrics_json, stability_warning = excluded.stability_warning
                "#,
            )
            .bind(row.run_id.to_string())
            .bind(row.rank)
            .bind(&row.symbol)
            .bind(row.window_start_ts)
            .bind(row.window_end_ts)
            .bind(serde_json::to_string(&row.metrics)?)
            .bind(row.stability_warning)
            .execute(&self.pool)
            .await
            .context("failed to save OOS result row")?;
        }
        Ok(())
    }

    async fn load_top_configs(&self, run_id: Uuid, top_n: usize) -> Result<Vec<TopConfig>> {
        let rows = sqlx::query(
            "SELECT * FROM optimizer_run_top_configs WHERE run_id = ? ORDER BY rank ASC LIMIT ?",
        )
        .bind(run_id.to_string())
        .bind(top_n as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let config_json: String = row.try_get("config_json")?;
            let metrics_json: String = row.try_get("metrics_json")?;
            out.push(TopConfig {
                run_id: Uuid::parse_str(&row.try_get::<String, _>("run_id")?)?,
                rank: row.try_get("rank")?,
                score: row.try_get("score")?,
                config: serde_json::from_str(&config_json)?,
                metrics: serde_json::from_str::<BacktestMetrics>(&metrics_json)?,
            });
        }
        Ok(out)
    }
}

pub struct SqlitePaperStore {
    pool: SqlitePool,
}

impl SqlitePaperStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaperStore for SqlitePaperStore {
    async fn load_run(&self, id: Uuid) -> Result<Option<PaperRun>> {
        let row = sqlx::query("SELECT * FROM paper_runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(PaperRun {
                id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
                symbol: row.try_get("symbol")?,
                timeframe_min: row.try_get("timeframe_min")?,
                status: status_from_str(&row.try_get::<String, _>("status")?),
            })),
            None => Ok(None),
        }
    }

    async fn create_run(&self, run: &PaperRun) -> Result<()> {
        sqlx::query("INSERT INTO paper_runs (id, symbol, timeframe_min, status) VALUES (?, ?, ?, ?)")
            .bind(run.id.to_string())
            .bind(&run.symbol)
            .bind(run.timeframe_min)
            .bind(status_to_str(run.status))
            .execute(&self.pool)
            .await
            .context("failed to create paper run")?;
        Ok(())
    }

    async fn save_run_status(&self, id: Uuid, status: PaperRunStatus) -> Result<()> {
        sqlx::query("UPDATE paper_runs SET status = ? WHERE id = ?")
            .bind(status_to_str(status))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to save paper run status")?;
        Ok(())
    }

    async fn insert_paper_config(&self, cfg: &PaperConfig) -> Result<()> {
        sqlx::query(
            "INSERT INTO paper_configs (id, run_id, rank, config_json, is_active, kill_reason) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(cfg.id.to_string())
        .bind(cfg.run_id.to_string())
        .bind(cfg.rank)
        .bind(serde_json::to_string(&cfg.config)?)
        .bind(cfg.is_active)
        .bind(&cfg.kill_reason)
        .execute(&self.pool)
        .await
        .context("failed to insert paper config")?;
        Ok(())
    }

    async fn list_paper_configs(&self, run_id: Uuid) -> Result<Vec<PaperConfig>> {
        let rows = sqlx::query("SELECT * FROM paper_configs WHERE run_id = ? ORDER BY rank ASC")
            .bind(run_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let config_json: String = row.try_get("config_json")?;
            out.push(PaperConfig {
                id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
                run_id: Uuid::parse_str(&row.try_get::<String, _>("run_id")?)?,
                rank: row.try_get("rank")?,
                config: serde_json::from_str(&config_json)?,
                is_active: row.try_get("is_active")?,
                kill_reason: row.try_get("kill_reason")?,
            });
        }
        Ok(out)
    }

    async fn set_config_active(&self, id: Uuid, is_active: bool, kill_reason: Option<String>) -> Result<()> {
        sqlx::query("UPDATE paper_configs SET is_active = ?, kill_reason = ? WHERE id = ?")
            .bind(is_active)
            .bind(kill_reason)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to set config active flag")?;
        Ok(())
    }

    async fn upsert_account(&self, account: &PaperAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO paper_accounts (
                run_id, paper_config_id, balance_start, balance, equity, max_equity, max_drawdown_pct,
                open_positions_json, trades_count, wins_count, losses_count, profit_factor, last_candle_ts,
                gross_wins, gross_losses
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(run_id, paper_config_id) DO UPDATE SET
                balance = excluded.balance, equity = excluded.equity, max_equity = excluded.max_equity,
                max_drawdown_pct = excluded.max_drawdown_pct, open_positions_json = excluded.open_positions_json,
                trades_count = excluded.trades_count, wins_count = excluded.wins_count,
                losses_count = excluded.losses_count, profit_factor = excluded.profit_factor,
                last_candle_ts = excluded.last_candle_ts, gross_wins = excluded.gross_wins,
                gross_losses = excluded.gross_losses
            "#,
        )
        .bind(account.run_id.to_string())
        .bind(account.paper_config_id.to_string())
        .bind(account.balance_start.to_string())
        .bind(account.balance.to_string())
        .bind(account.equity.to_string())
        .bind(account.max_equity.to_string())
        .bind(account.max_drawdown_pct)
        .bind(serde_json::to_string(&account.open_positions)?)
        .bind(account.trades_count as i64)
        .bind(account.wins_count as i64)
        .bind(account.losses_count as i64)
        .bind(account.profit_factor)
        .bind(account.last_candle_ts)
        .bind(account.gross_wins.to_string())
        .bind(account.gross_losses.to_string())
        .execute(&self.pool)
        .await
        .context("failed to upsert paper account")?;
        Ok(())
    }

    async fn get_account(&self, run_id: Uuid, config_id: Uuid) -> Result<Option<PaperAccount>> {
        let row = sqlx::query("SELECT * FROM paper_accounts WHERE run_id = ? AND paper_config_id = ?")
            .bind(run_id.to_string())
            .bind(config_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_account).transpose()
    }

    async fn list_active_accounts(&self, run_id: Uuid) -> Result<Vec<PaperAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT pa.* FROM paper_accounts pa
            JOIN paper_configs pc ON pc.id = pa.paper_config_id
            WHERE pa.run_id = ? AND pc.is_active = 1
            "#,
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_account).collect()
    }

    async fn insert_equity_snapshot(&self, snapshot: &EquitySnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO paper_equity_snapshots (run_id, paper_config_id, ts, equity, balance, dd_pct)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(run_id, paper_config_id, ts) DO UPDATE SET
                equity = excluded.equity, balance = excluded.balance, dd_pct = excluded.dd_pct
            "#,
        )
        .bind(snapshot.run_id.to_string())
        .bind(snapshot.config_id.to_string())
        .bind(snapshot.ts)
        .bind(snapshot.equity.to_string())
        .bind(snapshot.balance.to_string())
        .bind(snapshot.dd_pct)
        .execute(&self.pool)
        .await
        .context("failed to insert equity snapshot")?;
        Ok(())
    }

    async fn insert_event(&self, event: &PaperEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO paper_events (run_id, config_id, event, payload_json, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.run_id.to_string())
        .bind(event.config_id.map(|id| id.to_string()))
        .bind(&event.event)
        .bind(event.payload.to_string())
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .context("failed to insert paper event")?;
        Ok(())
    }
}

fn row_to_account(row: sqlx::sqlite::SqliteRow) -> Result<PaperAccount> {
    let open_positions_json: String = row.try_get("open_positions_json")?;
    Ok(PaperAccount {
        run_id: Uuid::parse_str(&row.try_get::<String, _>("run_id")?)?,
        paper_config_id: Uuid::parse_str(&row.try_get::<String, _>("paper_config_id")?)?,
        balance_start: dec_from(&row.try_get::<String, _>("balance_start")?),
        balance: dec_from(&row.try_get::<String, _>("balance")?),
        equity: dec_from(&row.try_get::<String, _>("equity")?),
        max_equity: dec_from(&row.try_get::<String, _>("max_equity")?),
        max_drawdown_pct: row.try_get("max_drawdown_pct")?,
        open_positions: serde_json::from_str::<OpenPositions>(&open_positions_json)?,
        trades_count: row.try_get::<i64, _>("trades_count")? as u64,
        wins_count: row.try_get::<i64, _>("wins_count")? as u64,
        losses_count: row.try_get::<i64, _>("losses_count")? as u64,
        profit_factor: row.try_get("profit_factor")?,
        last_candle_ts: row.try_get("last_candle_ts")?,
        gross_wins: dec_from(&row.try_get::<String, _>("gross_wins")?),
        gross_losses: dec_from(&row.try_get::<String, _>("gross_losses")?),
    })
}
