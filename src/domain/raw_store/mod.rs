//! Append-only raw data storage.
//!
//! Stores raw facts exactly as received from an exchange adapter; every
//! derived value (percentiles, cascade phases, labels) is computed by a
//! consumer at query time, never stored here. See the store-level invariants
//! in the crate's top-level specification: no update/delete on raw tables
//! (tier-config is the sole mutable exception), monotonically increasing row
//! ids, byte-preserved string fields.

pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::RawStoreError;
use types::*;

pub type RawStoreResult<T> = Result<T, RawStoreError>;

#[async_trait]
pub trait RawStore: Send + Sync {
    // -- Poll cycle management -------------------------------------------------

    async fn start_poll_cycle(&self, kind: CycleKind) -> RawStoreResult<i64>;

    async fn end_poll_cycle(&self, cycle_id: i64, stats: &PollCycleStats) -> RawStoreResult<()>;

    // -- Append-only writers ----------------------------------------------------

    async fn store_position_snapshot(
        &self,
        snapshot: NewPositionSnapshot,
    ) -> RawStoreResult<i64>;

    async fn store_wallet_snapshot(
        &self,
        snapshot: NewWalletAccountSnapshot,
    ) -> RawStoreResult<i64>;

    async fn store_liquidation_event(
        &self,
        event: NewLiquidationEvent,
    ) -> RawStoreResult<i64>;

    async fn store_oi_snapshot(&self, snapshot: NewOiSnapshot) -> RawStoreResult<i64>;

    async fn store_mark_price(&self, snapshot: NewMarkPriceSnapshot) -> RawStoreResult<i64>;

    async fn store_funding_snapshot(&self, snapshot: NewFundingSnapshot) -> RawStoreResult<i64>;

    async fn store_wallet_discovery(
        &self,
        wallet: &str,
        source: DiscoverySource,
        source_coin: Option<&str>,
        source_value: Option<f64>,
        source_metadata: Option<&str>,
    ) -> RawStoreResult<i64>;

    // -- Mutable wallet polling config -------------------------------------------

    async fn set_wallet_tier(
        &self,
        wallet: &str,
        tier: u8,
        next_poll_ts: i64,
    ) -> RawStoreResult<()>;

    async fn wallets_due_for_poll(&self, tier: u8, now_ts: i64) -> RawStoreResult<Vec<String>>;

    async fn update_wallet_poll_stats(
        &self,
        wallet: &str,
        next_poll_ts: i64,
        had_positions: bool,
    ) -> RawStoreResult<()>;

    async fn get_wallet_polling_config(
        &self,
        wallet: &str,
    ) -> RawStoreResult<Option<WalletPollingConfig>>;

    // -- Read-only history queries ------------------------------------------------

    async fn position_history(
        &self,
        wallet: &str,
        coin: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RawStoreResult<Vec<PositionSnapshot>>;

    async fn liquidations_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        coin: Option<&str>,
    ) -> RawStoreResult<Vec<LiquidationEvent>>;

    async fn oi_history(
        &self,
        coin: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RawStoreResult<Vec<OiSnapshot>>;

    async fn mark_price_near(
        &self,
        coin: &str,
        ts: i64,
        tolerance_ns: i64,
    ) -> RawStoreResult<Option<MarkPriceSnapshot>>;

    // -- Analytics table (spec §4.E: labels are persisted, unlike momentum/
    // absorption observations which are consumed live and never stored) ------

    async fn store_labeled_cascade(&self, cascade: NewLabeledCascade) -> RawStoreResult<i64>;

    async fn labeled_cascades_for_coin(
        &self,
        coin: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RawStoreResult<Vec<LabeledCascadeRecord>>;
}
