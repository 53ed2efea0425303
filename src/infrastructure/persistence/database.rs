//! SQLite connection pool + schema (spec §6 "Store schema").

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)
                        .await
                        .context("failed to create database directory")?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to SQLite database")?;

        info!(db_url, "connected to database");

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                symbol TEXT NOT NULL,
                timeframe_min INTEGER NOT NULL,
                ts INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume TEXT NOT NULL,
                source TEXT NOT NULL,
                PRIMARY KEY (symbol, timeframe_min, ts)
            );
            CREATE INDEX IF NOT EXISTS idx_candles_range ON candles (symbol, timeframe_min, ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create candles table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timeframe_state (
                symbol TEXT NOT NULL,
                timeframe_min INTEGER NOT NULL,
                ts INTEGER NOT NULL,
                state_json TEXT NOT NULL,
                PRIMARY KEY (symbol, timeframe_min, ts)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create timeframe_state table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS optimizer_runs (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                train_start_ts INTEGER NOT NULL,
                train_end_ts INTEGER NOT NULL,
                dd_limit_pct REAL NOT NULL,
                total_configs INTEGER NOT NULL DEFAULT 0,
                valid_configs INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create optimizer_runs table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS optimizer_run_top_configs (
                run_id TEXT NOT NULL,
                rank INTEGER NOT NULL,
                score REAL NOT NULL,
                config_json TEXT NOT NULL,
                metrics_json TEXT NOT NULL,
                PRIMARY KEY (run_id, rank)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create optimizer_run_top_configs table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS optimizer_run_configs (
                run_id TEXT NOT NULL,
                config_json TEXT NOT NULL,
                score REAL NOT NULL,
                metrics_json TEXT,
                PRIMARY KEY (run_id, config_json)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create optimizer_run_configs table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS optimizer_oos_results (
                run_id TEXT NOT NULL,
                rank INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                window_start_ts INTEGER NOT NULL,
                window_end_ts INTEGER NOT NULL,
                metrics_json TEXT NOT NULL,
                stability_warning BOOLEAN NOT NULL,
                PRIMARY KEY (run_id, rank)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create optimizer_oos_results table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS paper_runs (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                timeframe_min INTEGER NOT NULL,
                status TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create paper_runs table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS paper_configs (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                rank INTEGER NOT NULL,
                config_json TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                kill_reason TEXT,
                UNIQUE (run_id, rank)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create paper_configs table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS paper_accounts (
                run_id TEXT NOT NULL,
                paper_config_id TEXT NOT NULL,
                balance_start TEXT NOT NULL,
                balance TEXT NOT NULL,
                equity TEXT NOT NULL,
                max_equity TEXT NOT NULL,
                max_drawdown_pct REAL NOT NULL,
                open_positions_json TEXT NOT NULL,
                trades_count INTEGER NOT NULL,
                wins_count INTEGER NOT NULL,
                losses_count INTEGER NOT NULL,
                profit_factor REAL NOT NULL,
                last_candle_ts INTEGER,
                gross_wins TEXT NOT NULL,
                gross_losses TEXT NOT NULL,
                PRIMARY KEY (run_id, paper_config_id)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create paper_accounts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS paper_trades (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                config_id TEXT NOT NULL,
                opened_at INTEGER NOT NULL,
                side TEXT NOT NULL,
                entry TEXT NOT NULL,
                size TEXT NOT NULL,
                sl TEXT NOT NULL,
                tp TEXT NOT NULL,
                closed_at INTEGER,
                exit TEXT,
                pnl_pct REAL,
                pnl_abs TEXT,
                fees_abs TEXT,
                result TEXT,
                meta_json TEXT NOT NULL,
                UNIQUE (run_id, config_id, opened_at, side, entry)
            );
            CREATE INDEX IF NOT EXISTS idx_paper_trades_account ON paper_trades (run_id, config_id);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create paper_trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS paper_equity_snapshots (
                run_id TEXT NOT NULL,
                paper_config_id TEXT NOT NULL,
                ts INTEGER NOT NULL,
                equity TEXT NOT NULL,
                balance TEXT NOT NULL,
                dd_pct REAL NOT NULL,
                PRIMARY KEY (run_id, paper_config_id, ts)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create paper_equity_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS paper_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                config_id TEXT,
                event TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create paper_events table")?;

        info!("database schema initialized");
        Ok(())
    }
}
