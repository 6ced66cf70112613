use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::domain::exchange::RawPosition;

/// In-memory tracking state for one wallet, mirroring the durable row in
/// the raw store's polling-config table plus the per-coin "last known
/// position" cache needed to populate a liquidation event's last-known
/// fields and its reference to the snapshot row that observed them.
#[derive(Debug, Clone)]
pub(super) struct WalletTrack {
    pub tier: u8,
    pub consecutive_empty: u32,
    pub last_total_value: f64,
    pub last_positions: HashMap<String, (i64, RawPosition)>,
}

/// Per-tier priority queues (by next-poll timestamp) plus the wallet
/// tracking table. Mutated only at I/O boundaries by [`super::TieredPoller`].
#[derive(Default)]
pub(super) struct Scheduler {
    wallets: HashMap<String, WalletTrack>,
    queues: [BinaryHeap<Reverse<(i64, String)>>; 3],
}

impl Scheduler {
    pub fn contains(&self, wallet: &str) -> bool {
        self.wallets.contains_key(wallet)
    }

    pub fn insert(&mut self, wallet: String, tier: u8, next_poll_ts: i64) {
        let idx = (tier.clamp(1, 3) - 1) as usize;
        self.queues[idx].push(Reverse((next_poll_ts, wallet.clone())));
        self.wallets.insert(
            wallet,
            WalletTrack {
                tier: tier.clamp(1, 3),
                consecutive_empty: 0,
                last_total_value: 0.0,
                last_positions: HashMap::new(),
            },
        );
    }

    pub fn remove(&mut self, wallet: &str) {
        self.wallets.remove(wallet);
        // Lazily skipped on pop (see `drain_due`); no eager heap scan needed.
    }

    /// Pop every wallet in `tier` whose scheduled poll time has arrived.
    pub fn drain_due(&mut self, tier: u8, now: i64) -> Vec<String> {
        let idx = (tier.clamp(1, 3) - 1) as usize;
        let mut due = Vec::new();
        while let Some(Reverse((ts, wallet))) = self.queues[idx].peek().cloned() {
            if ts > now {
                break;
            }
            self.queues[idx].pop();
            if self.wallets.contains_key(&wallet) && self.wallets[&wallet].tier == tier {
                due.push(wallet);
            }
        }
        due
    }

    pub fn coins_for(&self, wallet: &str) -> HashSet<String> {
        self.wallets
            .get(wallet)
            .map(|w| w.last_positions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the last-known position for `(wallet, coin)` together with
    /// the row id of the snapshot that observed it, so a derived liquidation
    /// event can reference its preceding snapshot.
    pub fn last_position(&self, wallet: &str, coin: &str) -> Option<(i64, RawPosition)> {
        self.wallets.get(wallet)?.last_positions.get(coin).cloned()
    }

    pub fn update_after_poll(
        &mut self,
        wallet: &str,
        current_coins: &HashSet<String>,
        positions: &[(i64, RawPosition)],
        total_value: f64,
        had_positions: bool,
    ) {
        let Some(track) = self.wallets.get_mut(wallet) else {
            return;
        };
        track.last_positions = positions
            .iter()
            .map(|(id, p)| (p.coin.clone(), (*id, p.clone())))
            .collect();
        let _ = current_coins;
        track.last_total_value = total_value;
        track.consecutive_empty = if had_positions { 0 } else { track.consecutive_empty + 1 };
    }

    pub fn consecutive_empty(&self, wallet: &str) -> u32 {
        self.wallets.get(wallet).map(|w| w.consecutive_empty).unwrap_or(0)
    }

    pub fn reset_consecutive_empty(&mut self, wallet: &str) {
        if let Some(w) = self.wallets.get_mut(wallet) {
            w.consecutive_empty = 0;
        }
    }

    pub fn tier_of(&self, wallet: &str) -> Option<u8> {
        self.wallets.get(wallet).map(|w| w.tier)
    }

    pub fn set_tier(&mut self, wallet: &str, tier: u8) {
        if let Some(w) = self.wallets.get_mut(wallet) {
            w.tier = tier.clamp(1, 3);
        }
    }

    /// Re-enqueue a wallet onto its current tier's queue at `next_poll_ts`.
    pub fn reschedule(&mut self, wallet: &str, next_poll_ts: i64) {
        if let Some(tier) = self.tier_of(wallet) {
            let idx = (tier.clamp(1, 3) - 1) as usize;
            self.queues[idx].push(Reverse((next_poll_ts, wallet.to_string())));
        }
    }

    /// Linear back-off proportional to tier: tier N waits N x the normal interval.
    pub fn reschedule_backoff(&mut self, wallet: &str, now: i64, interval_s: f64) {
        if let Some(tier) = self.tier_of(wallet) {
            let delay_s = interval_s * tier as f64;
            let idx = (tier.clamp(1, 3) - 1) as usize;
            self.queues[idx].push(Reverse((now + (delay_s * 1_000_000_000.0) as i64, wallet.to_string())));
        }
    }

    pub fn tier_count(&self, tier: u8) -> usize {
        self.wallets.values().filter(|w| w.tier == tier).count()
    }
}
