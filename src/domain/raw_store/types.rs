use serde::{Deserialize, Serialize};

/// Scope tag for a poll cycle, named after the tier it was run for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleKind {
    Tier1,
    Tier2,
    Tier3,
    Discovery,
}

impl CycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleKind::Tier1 => "tier1",
            CycleKind::Tier2 => "tier2",
            CycleKind::Tier3 => "tier3",
            CycleKind::Discovery => "discovery",
        }
    }
}

/// Aggregated stats closing out a poll cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollCycleStats {
    pub wallets_polled: u32,
    pub positions_found: u32,
    pub liquidations_detected: u32,
    pub api_errors: u32,
    pub duration_ms: u64,
}

/// A raw position snapshot, stored byte-for-byte as received from the venue.
/// Every numeric field is a string so that source precision survives storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub id: i64,
    pub snapshot_ts: i64,
    pub poll_cycle_id: i64,
    pub wallet: String,
    pub coin: String,
    pub szi: String,
    pub entry_px: String,
    pub liquidation_px: Option<String>,
    pub leverage_kind: Option<String>,
    pub leverage_value: Option<String>,
    pub margin_used: Option<String>,
    pub position_value: Option<String>,
    pub unrealized_pnl: Option<String>,
}

/// Fields required to insert a new position snapshot; `id` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPositionSnapshot {
    pub snapshot_ts: i64,
    pub poll_cycle_id: i64,
    pub wallet: String,
    pub coin: String,
    pub szi: String,
    pub entry_px: String,
    pub liquidation_px: Option<String>,
    pub leverage_kind: Option<String>,
    pub leverage_value: Option<String>,
    pub margin_used: Option<String>,
    pub position_value: Option<String>,
    pub unrealized_pnl: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAccountSnapshot {
    pub id: i64,
    pub snapshot_ts: i64,
    pub poll_cycle_id: i64,
    pub wallet: String,
    pub account_value: Option<String>,
    pub total_margin_used: Option<String>,
    pub withdrawable: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewWalletAccountSnapshot {
    pub snapshot_ts: i64,
    pub poll_cycle_id: i64,
    pub wallet: String,
    pub account_value: Option<String>,
    pub total_margin_used: Option<String>,
    pub withdrawable: Option<String>,
}

/// A liquidation is purely the observation that a previously-seen position
/// disappeared between two snapshots of the same wallet; no price inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub id: i64,
    pub detected_ts: i64,
    pub wallet: String,
    pub coin: String,
    pub last_known_szi: String,
    pub last_known_entry_px: String,
    pub last_known_liquidation_px: Option<String>,
    pub last_known_position_value: Option<String>,
    pub last_known_unrealized_pnl: Option<String>,
    pub prev_snapshot_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewLiquidationEvent {
    pub detected_ts: i64,
    pub wallet: String,
    pub coin: String,
    pub last_known_szi: String,
    pub last_known_entry_px: String,
    pub last_known_liquidation_px: Option<String>,
    pub last_known_position_value: Option<String>,
    pub last_known_unrealized_pnl: Option<String>,
    pub prev_snapshot_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OiSnapshot {
    pub id: i64,
    pub snapshot_ts: i64,
    pub coin: String,
    pub open_interest: String,
    pub funding_rate: Option<String>,
    pub premium: Option<String>,
    pub day_ntl_vlm: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOiSnapshot {
    pub snapshot_ts: i64,
    pub coin: String,
    pub open_interest: String,
    pub funding_rate: Option<String>,
    pub premium: Option<String>,
    pub day_ntl_vlm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkPriceSnapshot {
    pub id: i64,
    pub snapshot_ts: i64,
    pub coin: String,
    pub mark_px: String,
    pub oracle_px: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMarkPriceSnapshot {
    pub snapshot_ts: i64,
    pub coin: String,
    pub mark_px: String,
    pub oracle_px: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSnapshot {
    pub id: i64,
    pub snapshot_ts: i64,
    pub coin: String,
    pub funding_rate: String,
    pub next_funding_ts: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewFundingSnapshot {
    pub snapshot_ts: i64,
    pub coin: String,
    pub funding_rate: String,
    pub next_funding_ts: Option<i64>,
}

/// How a wallet entered the polling universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoverySource {
    Trade,
    Liquidation,
    Position,
    Manual,
}

impl DiscoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoverySource::Trade => "trade",
            DiscoverySource::Liquidation => "liquidation",
            DiscoverySource::Position => "position",
            DiscoverySource::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDiscoveryRecord {
    pub id: i64,
    pub wallet: String,
    pub discovery_ts: i64,
    pub source: DiscoverySource,
    pub source_coin: Option<String>,
    pub source_value: Option<f64>,
    pub source_metadata: Option<String>,
}

/// The sole mutable row in the raw layer: per-wallet polling schedule state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletPollingConfig {
    pub wallet: String,
    pub tier: u8,
    pub last_poll_ts: Option<i64>,
    pub next_poll_ts: i64,
    pub consecutive_empty_polls: u32,
    pub last_known_total_value: Option<f64>,
}

/// Current time in nanoseconds, the unit used throughout the raw layer.
pub fn now_ns() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

/// A cascade label as written by the labeler. Waves are stored as their
/// serialized JSON form; the analytics table is append-only like every other
/// raw-store table.
#[derive(Debug, Clone)]
pub struct NewLabeledCascade {
    pub coin: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub oi_drop_pct: String,
    pub liquidation_count: u32,
    pub waves_json: String,
    pub price_at_start: Option<String>,
    pub price_at_end: Option<String>,
    pub price_at_post: Option<String>,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledCascadeRecord {
    pub id: i64,
    pub coin: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub oi_drop_pct: String,
    pub liquidation_count: u32,
    pub waves_json: String,
    pub price_at_start: Option<String>,
    pub price_at_end: Option<String>,
    pub price_at_post: Option<String>,
    pub outcome: String,
}
