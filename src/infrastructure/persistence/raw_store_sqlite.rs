//! SQLite-backed implementation of [`RawStore`], grounded on
//! `infrastructure/persistence/database.rs`'s pool/WAL setup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::errors::RawStoreError;
use crate::domain::raw_store::types::*;
use crate::domain::raw_store::{RawStore, RawStoreResult};

use super::database::Database;

pub struct SqliteRawStore {
    db: Database,
}

impl SqliteRawStore {
    pub async fn connect(db_url: &str) -> RawStoreResult<Self> {
        let db = Database::new(db_url)
            .await
            .map_err(|e| RawStoreError::Backend { reason: e.to_string() })?;
        Ok(Self { db })
    }
}

fn backend_err(e: sqlx::Error) -> RawStoreError {
    RawStoreError::Backend { reason: e.to_string() }
}

#[async_trait]
impl RawStore for SqliteRawStore {
    async fn start_poll_cycle(&self, kind: CycleKind) -> RawStoreResult<i64> {
        let now = now_ns();
        let row = sqlx::query("INSERT INTO poll_cycles (kind, start_ts) VALUES (?, ?) RETURNING id")
            .bind(kind.as_str())
            .bind(now)
            .fetch_one(&self.db.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn end_poll_cycle(&self, cycle_id: i64, stats: &PollCycleStats) -> RawStoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE poll_cycles
            SET end_ts = ?, wallets_polled = ?, positions_found = ?,
                liquidations_detected = ?, api_errors = ?, duration_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(now_ns())
        .bind(stats.wallets_polled)
        .bind(stats.positions_found)
        .bind(stats.liquidations_detected)
        .bind(stats.api_errors)
        .bind(stats.duration_ms as i64)
        .bind(cycle_id)
        .execute(&self.db.pool)
        .await
        .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            return Err(RawStoreError::UnknownPollCycle { cycle_id });
        }
        Ok(())
    }

    async fn store_position_snapshot(&self, s: NewPositionSnapshot) -> RawStoreResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO position_snapshots
                (snapshot_ts, poll_cycle_id, wallet, coin, szi, entry_px, liquidation_px,
                 leverage_kind, leverage_value, margin_used, position_value, unrealized_pnl)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(s.snapshot_ts)
        .bind(s.poll_cycle_id)
        .bind(&s.wallet)
        .bind(&s.coin)
        .bind(&s.szi)
        .bind(&s.entry_px)
        .bind(&s.liquidation_px)
        .bind(&s.leverage_kind)
        .bind(&s.leverage_value)
        .bind(&s.margin_used)
        .bind(&s.position_value)
        .bind(&s.unrealized_pnl)
        .fetch_one(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn store_wallet_snapshot(&self, s: NewWalletAccountSnapshot) -> RawStoreResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_account_snapshots
                (snapshot_ts, poll_cycle_id, wallet, account_value, total_margin_used, withdrawable)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(s.snapshot_ts)
        .bind(s.poll_cycle_id)
        .bind(&s.wallet)
        .bind(&s.account_value)
        .bind(&s.total_margin_used)
        .bind(&s.withdrawable)
        .fetch_one(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn store_liquidation_event(&self, e: NewLiquidationEvent) -> RawStoreResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO liquidation_events
                (detected_ts, wallet, coin, last_known_szi, last_known_entry_px,
                 last_known_liquidation_px, last_known_position_value,
                 last_known_unrealized_pnl, prev_snapshot_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(e.detected_ts)
        .bind(&e.wallet)
        .bind(&e.coin)
        .bind(&e.last_known_szi)
        .bind(&e.last_known_entry_px)
        .bind(&e.last_known_liquidation_px)
        .bind(&e.last_known_position_value)
        .bind(&e.last_known_unrealized_pnl)
        .bind(e.prev_snapshot_id)
        .fetch_one(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn store_oi_snapshot(&self, s: NewOiSnapshot) -> RawStoreResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO oi_snapshots (snapshot_ts, coin, open_interest, funding_rate, premium, day_ntl_vlm)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(s.snapshot_ts)
        .bind(&s.coin)
        .bind(&s.open_interest)
        .bind(&s.funding_rate)
        .bind(&s.premium)
        .bind(&s.day_ntl_vlm)
        .fetch_one(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn store_mark_price(&self, s: NewMarkPriceSnapshot) -> RawStoreResult<i64> {
        let row = sqlx::query(
            "INSERT INTO mark_price_snapshots (snapshot_ts, coin, mark_px, oracle_px) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(s.snapshot_ts)
        .bind(&s.coin)
        .bind(&s.mark_px)
        .bind(&s.oracle_px)
        .fetch_one(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn store_funding_snapshot(&self, s: NewFundingSnapshot) -> RawStoreResult<i64> {
        let row = sqlx::query(
            "INSERT INTO funding_snapshots (snapshot_ts, coin, funding_rate, next_funding_ts) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(s.snapshot_ts)
        .bind(&s.coin)
        .bind(&s.funding_rate)
        .bind(s.next_funding_ts)
        .fetch_one(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn store_wallet_discovery(
        &self,
        wallet: &str,
        source: DiscoverySource,
        source_coin: Option<&str>,
        source_value: Option<f64>,
        source_metadata: Option<&str>,
    ) -> RawStoreResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_discoveries
                (wallet, discovery_ts, source, source_coin, source_value, source_metadata)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(wallet)
        .bind(now_ns())
        .bind(source.as_str())
        .bind(source_coin)
        .bind(source_value)
        .bind(source_metadata)
        .fetch_one(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn set_wallet_tier(&self, wallet: &str, tier: u8, next_poll_ts: i64) -> RawStoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_polling_config (wallet, tier, next_poll_ts)
            VALUES (?, ?, ?)
            ON CONFLICT(wallet) DO UPDATE SET tier = excluded.tier, next_poll_ts = excluded.next_poll_ts
            "#,
        )
        .bind(wallet)
        .bind(tier as i64)
        .bind(next_poll_ts)
        .execute(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn wallets_due_for_poll(&self, tier: u8, now_ts: i64) -> RawStoreResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT wallet FROM wallet_polling_config WHERE tier = ? AND next_poll_ts <= ? ORDER BY next_poll_ts ASC",
        )
        .bind(tier as i64)
        .bind(now_ts)
        .fetch_all(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("wallet")).collect())
    }

    async fn update_wallet_poll_stats(
        &self,
        wallet: &str,
        next_poll_ts: i64,
        had_positions: bool,
    ) -> RawStoreResult<()> {
        sqlx::query(
            r#"
            UPDATE wallet_polling_config
            SET last_poll_ts = ?,
                next_poll_ts = ?,
                consecutive_empty_polls = CASE WHEN ? THEN 0 ELSE consecutive_empty_polls + 1 END
            WHERE wallet = ?
            "#,
        )
        .bind(now_ns())
        .bind(next_poll_ts)
        .bind(had_positions)
        .bind(wallet)
        .execute(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn get_wallet_polling_config(&self, wallet: &str) -> RawStoreResult<Option<WalletPollingConfig>> {
        let row = sqlx::query(
            r#"
            SELECT wallet, tier, last_poll_ts, next_poll_ts, consecutive_empty_polls, last_known_total_value
            FROM wallet_polling_config WHERE wallet = ?
            "#,
        )
        .bind(wallet)
        .fetch_optional(&self.db.pool)
        .await
        .map_err(backend_err)?;

        Ok(row.map(|r| WalletPollingConfig {
            wallet: r.get::<String, _>("wallet"),
            tier: r.get::<i64, _>("tier") as u8,
            last_poll_ts: r.get::<Option<i64>, _>("last_poll_ts"),
            next_poll_ts: r.get::<i64, _>("next_poll_ts"),
            consecutive_empty_polls: r.get::<i64, _>("consecutive_empty_polls") as u32,
            last_known_total_value: r.get::<Option<f64>, _>("last_known_total_value"),
        }))
    }

    async fn position_history(
        &self,
        wallet: &str,
        coin: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RawStoreResult<Vec<PositionSnapshot>> {
        let start_ns = start.timestamp_nanos_opt().unwrap_or(0);
        let end_ns = end.timestamp_nanos_opt().unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT id, snapshot_ts, poll_cycle_id, wallet, coin, szi, entry_px, liquidation_px,
                   leverage_kind, leverage_value, margin_used, position_value, unrealized_pnl
            FROM position_snapshots
            WHERE wallet = ? AND coin = ? AND snapshot_ts >= ? AND snapshot_ts <= ?
            ORDER BY snapshot_ts ASC
            "#,
        )
        .bind(wallet)
        .bind(coin)
        .bind(start_ns)
        .bind(end_ns)
        .fetch_all(&self.db.pool)
        .await
        .map_err(backend_err)?;

        Ok(rows
            .into_iter()
            .map(|r| PositionSnapshot {
                id: r.get("id"),
                snapshot_ts: r.get("snapshot_ts"),
                poll_cycle_id: r.get("poll_cycle_id"),
                wallet: r.get("wallet"),
                coin: r.get("coin"),
                szi: r.get("szi"),
                entry_px: r.get("entry_px"),
                liquidation_px: r.get("liquidation_px"),
                leverage_kind: r.get("leverage_kind"),
                leverage_value: r.get("leverage_value"),
                margin_used: r.get("margin_used"),
                position_value: r.get("position_value"),
                unrealized_pnl: r.get("unrealized_pnl"),
            })
            .collect())
    }

    async fn liquidations_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        coin: Option<&str>,
    ) -> RawStoreResult<Vec<LiquidationEvent>> {
        let start_ns = start.timestamp_nanos_opt().unwrap_or(0);
        let end_ns = end.timestamp_nanos_opt().unwrap_or(i64::MAX);

        let rows = if let Some(coin) = coin {
            sqlx::query(
                r#"
                SELECT id, detected_ts, wallet, coin, last_known_szi, last_known_entry_px,
                       last_known_liquidation_px, last_known_position_value,
                       last_known_unrealized_pnl, prev_snapshot_id
                FROM liquidation_events
                WHERE detected_ts >= ? AND detected_ts <= ? AND coin = ?
                ORDER BY detected_ts ASC
                "#,
            )
            .bind(start_ns)
            .bind(end_ns)
            .bind(coin)
            .fetch_all(&self.db.pool)
            .await
        } else {
            sqlx::query(
                r#"
                SELECT id, detected_ts, wallet, coin, last_known_szi, last_known_entry_px,
                       last_known_liquidation_px, last_known_position_value,
                       last_known_unrealized_pnl, prev_snapshot_id
                FROM liquidation_events
                WHERE detected_ts >= ? AND detected_ts <= ?
                ORDER BY detected_ts ASC
                "#,
            )
            .bind(start_ns)
            .bind(end_ns)
            .fetch_all(&self.db.pool)
            .await
        }
        .map_err(backend_err)?;

        Ok(rows
            .into_iter()
            .map(|r| LiquidationEvent {
                id: r.get("id"),
                detected_ts: r.get("detected_ts"),
                wallet: r.get("wallet"),
                coin: r.get("coin"),
                last_known_szi: r.get("last_known_szi"),
                last_known_entry_px: r.get("last_known_entry_px"),
                last_known_liquidation_px: r.get("last_known_liquidation_px"),
                last_known_position_value: r.get("last_known_position_value"),
                last_known_unrealized_pnl: r.get("last_known_unrealized_pnl"),
                prev_snapshot_id: r.get("prev_snapshot_id"),
            })
            .collect())
    }

    async fn oi_history(
        &self,
        coin: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RawStoreResult<Vec<OiSnapshot>> {
        let start_ns = start.timestamp_nanos_opt().unwrap_or(0);
        let end_ns = end.timestamp_nanos_opt().unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT id, snapshot_ts, coin, open_interest, funding_rate, premium, day_ntl_vlm
            FROM oi_snapshots
            WHERE coin = ? AND snapshot_ts >= ? AND snapshot_ts <= ?
            ORDER BY snapshot_ts ASC
            "#,
        )
        .bind(coin)
        .bind(start_ns)
        .bind(end_ns)
        .fetch_all(&self.db.pool)
        .await
        .map_err(backend_err)?;

        Ok(rows
            .into_iter()
            .map(|r| OiSnapshot {
                id: r.get("id"),
                snapshot_ts: r.get("snapshot_ts"),
                coin: r.get("coin"),
                open_interest: r.get("open_interest"),
                funding_rate: r.get("funding_rate"),
                premium: r.get("premium"),
                day_ntl_vlm: r.get("day_ntl_vlm"),
            })
            .collect())
    }

    async fn mark_price_near(
        &self,
        coin: &str,
        ts: i64,
        tolerance_ns: i64,
    ) -> RawStoreResult<Option<MarkPriceSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT id, snapshot_ts, coin, mark_px, oracle_px
            FROM mark_price_snapshots
            WHERE coin = ? AND snapshot_ts >= ? AND snapshot_ts <= ?
            ORDER BY ABS(snapshot_ts - ?) ASC
            LIMIT 1
            "#,
        )
        .bind(coin)
        .bind(ts - tolerance_ns)
        .bind(ts + tolerance_ns)
        .bind(ts)
        .fetch_optional(&self.db.pool)
        .await
        .map_err(backend_err)?;

        Ok(row.map(|r| MarkPriceSnapshot {
            id: r.get("id"),
            snapshot_ts: r.get("snapshot_ts"),
            coin: r.get("coin"),
            mark_px: r.get("mark_px"),
            oracle_px: r.get("oracle_px"),
        }))
    }

    async fn store_labeled_cascade(&self, c: NewLabeledCascade) -> RawStoreResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO labeled_cascades
                (coin, start_ts, end_ts, oi_drop_pct, liquidation_count, waves_json,
                 price_at_start, price_at_end, price_at_post, outcome)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&c.coin)
        .bind(c.start_ts)
        .bind(c.end_ts)
        .bind(&c.oi_drop_pct)
        .bind(c.liquidation_count)
        .bind(&c.waves_json)
        .bind(&c.price_at_start)
        .bind(&c.price_at_end)
        .bind(&c.price_at_post)
        .bind(&c.outcome)
        .fetch_one(&self.db.pool)
        .await
        .map_err(backend_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn labeled_cascades_for_coin(
        &self,
        coin: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RawStoreResult<Vec<LabeledCascadeRecord>> {
        let start_ns = start.timestamp_nanos_opt().unwrap_or(0);
        let end_ns = end.timestamp_nanos_opt().unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT id, coin, start_ts, end_ts, oi_drop_pct, liquidation_count, waves_json,
                   price_at_start, price_at_end, price_at_post, outcome
            FROM labeled_cascades
            WHERE coin = ? AND start_ts >= ? AND start_ts <= ?
            ORDER BY start_ts ASC
            "#,
        )
        .bind(coin)
        .bind(start_ns)
        .bind(end_ns)
        .fetch_all(&self.db.pool)
        .await
        .map_err(backend_err)?;

        Ok(rows
            .into_iter()
            .map(|r| LabeledCascadeRecord {
                id: r.get("id"),
                coin: r.get("coin"),
                start_ts: r.get("start_ts"),
                end_ts: r.get("end_ts"),
                oi_drop_pct: r.get("oi_drop_pct"),
                liquidation_count: r.get::<i64, _>("liquidation_count") as u32,
                waves_json: r.get("waves_json"),
                price_at_start: r.get("price_at_start"),
                price_at_end: r.get("price_at_end"),
                price_at_post: r.get("price_at_post"),
                outcome: r.get("outcome"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteRawStore {
        SqliteRawStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn poll_cycle_ids_are_monotonic() {
        let store = store().await;
        let a = store.start_poll_cycle(CycleKind::Tier1).await.unwrap();
        let b = store.start_poll_cycle(CycleKind::Tier1).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn ending_unknown_cycle_errors() {
        let store = store().await;
        let result = store.end_poll_cycle(999, &PollCycleStats::default()).await;
        assert!(matches!(result, Err(RawStoreError::UnknownPollCycle { cycle_id: 999 })));
    }

    #[tokio::test]
    async fn position_snapshot_roundtrips() {
        let store = store().await;
        let cycle = store.start_poll_cycle(CycleKind::Tier1).await.unwrap();
        let id = store
            .store_position_snapshot(NewPositionSnapshot {
                snapshot_ts: 1_000,
                poll_cycle_id: cycle,
                wallet: "0xabc".to_string(),
                coin: "BTC".to_string(),
                szi: "1.5".to_string(),
                entry_px: "50000.25".to_string(),
                liquidation_px: Some("45000".to_string()),
                leverage_kind: Some("cross".to_string()),
                leverage_value: Some("10".to_string()),
                margin_used: Some("7500".to_string()),
                position_value: Some("75000".to_string()),
                unrealized_pnl: Some("100".to_string()),
            })
            .await
            .unwrap();
        assert!(id > 0);

        let history = store
            .position_history(
                "0xabc",
                "BTC",
                DateTime::from_timestamp_nanos(0),
                DateTime::from_timestamp_nanos(i64::MAX),
            )
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].entry_px, "50000.25");
    }

    #[tokio::test]
    async fn wallet_tier_config_is_mutable() {
        let store = store().await;
        store.set_wallet_tier("0xabc", 1, 100).await.unwrap();
        store.set_wallet_tier("0xabc", 2, 200).await.unwrap();

        let cfg = store.get_wallet_polling_config("0xabc").await.unwrap().unwrap();
        assert_eq!(cfg.tier, 2);
        assert_eq!(cfg.next_poll_ts, 200);
    }

    #[tokio::test]
    async fn wallets_due_for_poll_filters_by_tier_and_time() {
        let store = store().await;
        store.set_wallet_tier("0xabc", 1, 100).await.unwrap();
        store.set_wallet_tier("0xdef", 1, 500).await.unwrap();

        let due = store.wallets_due_for_poll(1, 200).await.unwrap();
        assert_eq!(due, vec!["0xabc".to_string()]);
    }

    #[tokio::test]
    async fn update_wallet_poll_stats_resets_empty_count_on_positions() {
        let store = store().await;
        store.set_wallet_tier("0xabc", 1, 100).await.unwrap();
        store.update_wallet_poll_stats("0xabc", 200, false).await.unwrap();
        store.update_wallet_poll_stats("0xabc", 300, false).await.unwrap();
        let cfg = store.get_wallet_polling_config("0xabc").await.unwrap().unwrap();
        assert_eq!(cfg.consecutive_empty_polls, 2);

        store.update_wallet_poll_stats("0xabc", 400, true).await.unwrap();
        let cfg = store.get_wallet_polling_config("0xabc").await.unwrap().unwrap();
        assert_eq!(cfg.consecutive_empty_polls, 0);
    }

    #[tokio::test]
    async fn mark_price_near_picks_closest_within_tolerance() {
        let store = store().await;
        store
            .store_mark_price(NewMarkPriceSnapshot {
                snapshot_ts: 1_000,
                coin: "BTC".to_string(),
                mark_px: "50000".to_string(),
                oracle_px: None,
            })
            .await
            .unwrap();
        store
            .store_mark_price(NewMarkPriceSnapshot {
                snapshot_ts: 2_000,
                coin: "BTC".to_string(),
                mark_px: "50100".to_string(),
                oracle_px: None,
            })
            .await
            .unwrap();

        let found = store.mark_price_near("BTC", 1_900, 500).await.unwrap().unwrap();
        assert_eq!(found.mark_px, "50100");

        let none = store.mark_price_near("BTC", 10_000, 500).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn labeled_cascades_roundtrip_and_filter_by_coin_and_range() {
        let store = store().await;
        store
            .store_labeled_cascade(NewLabeledCascade {
                coin: "ETH".to_string(),
                start_ts: 1_000,
                end_ts: 2_000,
                oi_drop_pct: "12.5".to_string(),
                liquidation_count: 4,
                waves_json: "[]".to_string(),
                price_at_start: Some("3000".to_string()),
                price_at_end: Some("2900".to_string()),
                price_at_post: Some("2950".to_string()),
                outcome: "reversal".to_string(),
            })
            .await
            .unwrap();
        store
            .store_labeled_cascade(NewLabeledCascade {
                coin: "BTC".to_string(),
                start_ts: 1_500,
                end_ts: 2_500,
                oi_drop_pct: "15.0".to_string(),
                liquidation_count: 6,
                waves_json: "[]".to_string(),
                price_at_start: None,
                price_at_end: None,
                price_at_post: None,
                outcome: "unknown".to_string(),
            })
            .await
            .unwrap();

        let eth_only = store
            .labeled_cascades_for_coin("ETH", DateTime::from_timestamp_nanos(0), DateTime::from_timestamp_nanos(i64::MAX))
            .await
            .unwrap();
        assert_eq!(eth_only.len(), 1);
        assert_eq!(eth_only[0].liquidation_count, 4);
        assert_eq!(eth_only[0].outcome, "reversal");
    }
}
