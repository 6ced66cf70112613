//! Tiered wallet polling.
//!
//! Partitions a working set of wallets into three tiers by observed total
//! position value, polls each tier at its own cadence under a shared
//! per-minute request budget, and derives liquidation events purely from
//! position-set diffing between consecutive polls of the same wallet.
//! Mechanical, not judgmental: tier assignment never looks at anything but
//! observed value.

mod config;
mod scheduler;

pub use config::PollerConfig;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::errors::PollerError;
use crate::domain::exchange::{ExchangeAdapter, RawPosition};
use crate::domain::raw_store::types::{
    CycleKind, DiscoverySource, NewLiquidationEvent, NewPositionSnapshot, NewWalletAccountSnapshot,
    PollCycleStats,
};
use crate::domain::raw_store::{RawStore, RawStoreResult};

use scheduler::Scheduler;

pub type PollerResult<T> = Result<T, PollerError>;

/// Owns three tier-poll loops and a discovery loop against a shared raw
/// store and exchange adapter. Scheduling state is mutated only at I/O
/// boundaries, per the crate-wide concurrency model.
pub struct TieredPoller {
    config: PollerConfig,
    store: Arc<dyn RawStore>,
    exchange: Arc<dyn ExchangeAdapter>,
    scheduler: Mutex<Scheduler>,
}

fn now_ns() -> i64 {
    crate::domain::raw_store::types::now_ns()
}

impl TieredPoller {
    pub fn new(
        config: PollerConfig,
        store: Arc<dyn RawStore>,
        exchange: Arc<dyn ExchangeAdapter>,
    ) -> Self {
        Self {
            config,
            store,
            exchange,
            scheduler: Mutex::new(Scheduler::default()),
        }
    }

    /// Register a wallet at `tier` (default retention tier is 3). Idempotent:
    /// calling this twice for the same wallet leaves tracking state
    /// unchanged after the second call.
    pub async fn add_wallet(
        &self,
        wallet: &str,
        tier: u8,
        source: DiscoverySource,
        source_coin: Option<&str>,
        source_value: Option<f64>,
    ) -> RawStoreResult<()> {
        let wallet = wallet.to_lowercase();
        {
            let mut sched = self.scheduler.lock().await;
            if sched.contains(&wallet) {
                return Ok(());
            }
            sched.insert(wallet.clone(), tier, now_ns());
        }
        self.store
            .store_wallet_discovery(&wallet, source, source_coin, source_value, None)
            .await?;
        self.store.set_wallet_tier(&wallet, tier, now_ns()).await?;
        info!(wallet = %short(&wallet), tier, "wallet added to tiered poller");
        Ok(())
    }

    pub async fn remove_wallet(&self, wallet: &str) {
        let wallet = wallet.to_lowercase();
        self.scheduler.lock().await.remove(&wallet);
        info!(wallet = %short(&wallet), "wallet removed from tiered poller");
    }

    pub fn assign_tier_by_value(&self, total_value: f64) -> u8 {
        if total_value >= self.config.tier1_threshold_usd {
            1
        } else if total_value >= self.config.tier2_threshold_usd {
            2
        } else {
            3
        }
    }

    pub async fn run_tier1_poll(&self) -> PollerResult<PollCycleStats> {
        self.run_tier_poll(1, self.config.tier1_interval_s).await
    }

    pub async fn run_tier2_poll(&self) -> PollerResult<PollCycleStats> {
        self.run_tier_poll(2, self.config.tier2_interval_s).await
    }

    pub async fn run_tier3_poll(&self) -> PollerResult<PollCycleStats> {
        self.run_tier_poll(3, self.config.tier3_interval_s).await
    }

    async fn run_tier_poll(&self, tier: u8, interval_s: f64) -> PollerResult<PollCycleStats> {
        let due = {
            let mut sched = self.scheduler.lock().await;
            sched.drain_due(tier, now_ns())
        };
        if due.is_empty() {
            return Ok(PollCycleStats::default());
        }

        let cycle_kind = match tier {
            1 => CycleKind::Tier1,
            2 => CycleKind::Tier2,
            _ => CycleKind::Tier3,
        };
        let cycle_id = self.store.start_poll_cycle(cycle_kind).await?;
        let started = std::time::Instant::now();
        let mut stats = PollCycleStats::default();
        let pace = self.request_pace_delay();

        for wallet in due {
            match self.poll_wallet(&wallet, cycle_id, &mut stats).await {
                Ok(()) => stats.wallets_polled += 1,
                Err(e) => {
                    warn!(wallet = %short(&wallet), error = %e, "wallet poll failed");
                    stats.api_errors += 1;
                    let mut sched = self.scheduler.lock().await;
                    sched.reschedule_backoff(&wallet, now_ns(), interval_s);
                }
            }
            if pace > Duration::ZERO {
                tokio::time::sleep(pace).await;
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        self.store.end_poll_cycle(cycle_id, &stats).await?;
        debug!(tier, wallets = stats.wallets_polled, positions = stats.positions_found, "tier poll complete");
        Ok(stats)
    }

    fn request_pace_delay(&self) -> Duration {
        if self.config.requests_per_minute == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(60.0 / self.config.requests_per_minute as f64)
    }

    async fn poll_wallet(
        &self,
        wallet: &str,
        cycle_id: i64,
        stats: &mut PollCycleStats,
    ) -> PollerResult<()> {
        let snapshot_ts = now_ns();
        let state = self
            .exchange
            .clearinghouse_state(wallet)
            .await
            .map_err(|e| PollerError::AdapterFailure {
                wallet: wallet.to_string(),
                reason: e.to_string(),
            })?;

        if state.account_value.is_some() || state.total_margin_used.is_some() {
            self.store
                .store_wallet_snapshot(NewWalletAccountSnapshot {
                    snapshot_ts,
                    poll_cycle_id: cycle_id,
                    wallet: wallet.to_string(),
                    account_value: state.account_value.clone(),
                    total_margin_used: state.total_margin_used.clone(),
                    withdrawable: state.withdrawable.clone(),
                })
                .await?;
        }

        let mut current_coins = HashSet::new();
        let mut total_value = 0.0f64;
        let mut stored_positions: Vec<(i64, RawPosition)> = Vec::with_capacity(state.positions.len());

        for pos in &state.positions {
            current_coins.insert(pos.coin.clone());
            let snapshot_id = self
                .store
                .store_position_snapshot(new_position_snapshot(snapshot_ts, cycle_id, wallet, pos))
                .await?;
            stored_positions.push((snapshot_id, pos.clone()));
            stats.positions_found += 1;
            total_value += pos
                .position_value
                .as_deref()
                .and_then(|v| v.parse::<f64>().ok())
                .map(f64::abs)
                .unwrap_or(0.0);
        }

        let had_positions = !state.positions.is_empty();
        let (liquidated, demote_for_inactivity) = {
            let mut sched = self.scheduler.lock().await;
            let previous_coins = sched.coins_for(wallet);
            let liquidated: Vec<(String, Option<(i64, RawPosition)>)> = previous_coins
                .difference(&current_coins)
                .map(|coin| (coin.clone(), sched.last_position(wallet, coin)))
                .collect();

            sched.update_after_poll(wallet, &current_coins, &stored_positions, total_value, had_positions);
            let demote_for_inactivity =
                sched.consecutive_empty(wallet) >= self.config.empty_polls_before_demotion;
            (liquidated, demote_for_inactivity)
        };

        for (coin, last_known) in liquidated {
            let event = last_known
                .map(|(prev_snapshot_id, p)| NewLiquidationEvent {
                    detected_ts: snapshot_ts,
                    wallet: wallet.to_string(),
                    coin: coin.clone(),
                    last_known_szi: p.szi,
                    last_known_entry_px: p.entry_px,
                    last_known_liquidation_px: p.liquidation_px,
                    last_known_position_value: p.position_value,
                    last_known_unrealized_pnl: p.unrealized_pnl,
                    prev_snapshot_id: Some(prev_snapshot_id),
                })
                .unwrap_or_else(|| NewLiquidationEvent {
                    detected_ts: snapshot_ts,
                    wallet: wallet.to_string(),
                    coin: coin.clone(),
                    last_known_szi: "unknown".to_string(),
                    last_known_entry_px: "unknown".to_string(),
                    last_known_liquidation_px: None,
                    last_known_position_value: None,
                    last_known_unrealized_pnl: None,
                    prev_snapshot_id: None,
                });
            self.store.store_liquidation_event(event).await?;
            stats.liquidations_detected += 1;
            info!(wallet = %short(wallet), coin = %coin, "liquidation detected");
        }

        let mut sched = self.scheduler.lock().await;
        let tier_before = sched.tier_of(wallet).unwrap_or(3);
        let reassigned = self.assign_tier_by_value(total_value);
        if reassigned < tier_before {
            sched.set_tier(wallet, reassigned);
            self.store.set_wallet_tier(wallet, reassigned, 0).await?;
            info!(wallet = %short(wallet), from = tier_before, to = reassigned, "wallet promoted");
        } else if reassigned > tier_before && sched.consecutive_empty(wallet) == 0 {
            sched.set_tier(wallet, reassigned);
            self.store.set_wallet_tier(wallet, reassigned, 0).await?;
            info!(wallet = %short(wallet), from = tier_before, to = reassigned, "wallet demoted (value)");
        } else if demote_for_inactivity && tier_before < 3 {
            sched.set_tier(wallet, tier_before + 1);
            sched.reset_consecutive_empty(wallet);
            self.store.set_wallet_tier(wallet, tier_before + 1, 0).await?;
            info!(wallet = %short(wallet), from = tier_before, "wallet demoted (inactivity)");
        }

        // Use the wallet's post-reassignment tier, not the loop's own
        // tier interval: a wallet promoted or demoted-by-value above must
        // be rescheduled on its new tier's cadence, not the one it was
        // just polled under.
        let current_tier_interval_s = self.config.interval_for_tier(sched.tier_of(wallet).unwrap_or(3));
        let next_poll_ts = snapshot_ts + (current_tier_interval_s * 1_000_000_000.0) as i64;
        sched.reschedule(wallet, next_poll_ts);
        self.store
            .update_wallet_poll_stats(wallet, next_poll_ts, had_positions)
            .await?;
        Ok(())
    }

    /// Scan recent trades on the configured discovery coins for wallets
    /// whose notional exceeds the configured minimum and enqueue them.
    pub async fn run_discovery(&self) -> PollerResult<usize> {
        let mut discovered = 0usize;
        for coin in &self.config.discovery_coins {
            let trades = self
                .exchange
                .recent_trades(coin)
                .await
                .map_err(|e| PollerError::AdapterFailure {
                    wallet: String::new(),
                    reason: e.to_string(),
                })?;
            for trade in trades {
                let price: f64 = trade.price.parse().unwrap_or(0.0);
                let size: f64 = trade.size.parse().unwrap_or(0.0);
                let value = (price * size).abs();
                if value < self.config.discovery_min_value_usd {
                    continue;
                }
                let Some(wallet) = trade.wallet.as_deref() else {
                    continue;
                };
                let wallet = wallet.to_lowercase();
                if self.scheduler.lock().await.contains(&wallet) {
                    continue;
                }
                self.add_wallet(&wallet, 3, DiscoverySource::Trade, Some(coin), Some(value))
                    .await?;
                discovered += 1;
            }
        }
        if discovered > 0 {
            info!(discovered, "discovery run found new wallets");
        }
        Ok(discovered)
    }

    pub async fn tier_count(&self, tier: u8) -> usize {
        self.scheduler.lock().await.tier_count(tier)
    }
}

fn new_position_snapshot(
    snapshot_ts: i64,
    poll_cycle_id: i64,
    wallet: &str,
    pos: &RawPosition,
) -> NewPositionSnapshot {
    NewPositionSnapshot {
        snapshot_ts,
        poll_cycle_id,
        wallet: wallet.to_string(),
        coin: pos.coin.clone(),
        szi: pos.szi.clone(),
        entry_px: pos.entry_px.clone(),
        liquidation_px: pos.liquidation_px.clone(),
        leverage_kind: pos.leverage_kind.clone(),
        leverage_value: pos.leverage_value.clone(),
        margin_used: pos.margin_used.clone(),
        position_value: pos.position_value.clone(),
        unrealized_pnl: pos.unrealized_pnl.clone(),
    }
}

fn short(wallet: &str) -> String {
    wallet.chars().take(10).collect()
}
