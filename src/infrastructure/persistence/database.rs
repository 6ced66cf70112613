use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Pooled connection to the append-only raw store's backing SQLite database.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize the raw-store schema. Every table but `wallet_polling_config`
    /// is append-only per spec §4.A; indexes exist on (wallet, coin, timestamp)
    /// for history queries and (next_poll_ts, tier) for scheduling.
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_cycles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                start_ts INTEGER NOT NULL,
                end_ts INTEGER,
                wallets_polled INTEGER NOT NULL DEFAULT 0,
                positions_found INTEGER NOT NULL DEFAULT 0,
                liquidations_detected INTEGER NOT NULL DEFAULT 0,
                api_errors INTEGER NOT NULL DEFAULT 0,
                duration_ms INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create poll_cycles table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS position_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_ts INTEGER NOT NULL,
                poll_cycle_id INTEGER NOT NULL,
                wallet TEXT NOT NULL,
                coin TEXT NOT NULL,
                szi TEXT NOT NULL,
                entry_px TEXT NOT NULL,
                liquidation_px TEXT,
                leverage_kind TEXT,
                leverage_value TEXT,
                margin_used TEXT,
                position_value TEXT,
                unrealized_pnl TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_position_snapshots_wallet_coin_ts
            ON position_snapshots (wallet, coin, snapshot_ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create position_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallet_account_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_ts INTEGER NOT NULL,
                poll_cycle_id INTEGER NOT NULL,
                wallet TEXT NOT NULL,
                account_value TEXT,
                total_margin_used TEXT,
                withdrawable TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_wallet_account_snapshots_wallet_ts
            ON wallet_account_snapshots (wallet, snapshot_ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create wallet_account_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS liquidation_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                detected_ts INTEGER NOT NULL,
                wallet TEXT NOT NULL,
                coin TEXT NOT NULL,
                last_known_szi TEXT NOT NULL,
                last_known_entry_px TEXT NOT NULL,
                last_known_liquidation_px TEXT,
                last_known_position_value TEXT,
                last_known_unrealized_pnl TEXT,
                prev_snapshot_id INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_liquidation_events_wallet_coin_ts
            ON liquidation_events (wallet, coin, detected_ts);
            CREATE INDEX IF NOT EXISTS idx_liquidation_events_ts
            ON liquidation_events (detected_ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create liquidation_events table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS oi_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_ts INTEGER NOT NULL,
                coin TEXT NOT NULL,
                open_interest TEXT NOT NULL,
                funding_rate TEXT,
                premium TEXT,
                day_ntl_vlm TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_oi_snapshots_coin_ts
            ON oi_snapshots (coin, snapshot_ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create oi_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mark_price_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_ts INTEGER NOT NULL,
                coin TEXT NOT NULL,
                mark_px TEXT NOT NULL,
                oracle_px TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_mark_price_snapshots_coin_ts
            ON mark_price_snapshots (coin, snapshot_ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create mark_price_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS funding_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_ts INTEGER NOT NULL,
                coin TEXT NOT NULL,
                funding_rate TEXT NOT NULL,
                next_funding_ts INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_funding_snapshots_coin_ts
            ON funding_snapshots (coin, snapshot_ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create funding_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallet_discoveries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                wallet TEXT NOT NULL,
                discovery_ts INTEGER NOT NULL,
                source TEXT NOT NULL,
                source_coin TEXT,
                source_value REAL,
                source_metadata TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_wallet_discoveries_wallet
            ON wallet_discoveries (wallet);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create wallet_discoveries table")?;

        // The sole mutable table in the raw layer (spec §4.A invariant i, §9).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallet_polling_config (
                wallet TEXT PRIMARY KEY,
                tier INTEGER NOT NULL,
                last_poll_ts INTEGER,
                next_poll_ts INTEGER NOT NULL,
                consecutive_empty_polls INTEGER NOT NULL DEFAULT 0,
                last_known_total_value REAL
            );
            CREATE INDEX IF NOT EXISTS idx_wallet_polling_config_schedule
            ON wallet_polling_config (next_poll_ts, tier);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create wallet_polling_config table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS labeled_cascades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                coin TEXT NOT NULL,
                start_ts INTEGER NOT NULL,
                end_ts INTEGER NOT NULL,
                oi_drop_pct TEXT NOT NULL,
                liquidation_count INTEGER NOT NULL,
                waves_json TEXT NOT NULL,
                price_at_start TEXT,
                price_at_end TEXT,
                price_at_post TEXT,
                outcome TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_labeled_cascades_coin_ts
            ON labeled_cascades (coin, start_ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create labeled_cascades table")?;

        info!("Raw-store schema initialized.");
        Ok(())
    }
}
