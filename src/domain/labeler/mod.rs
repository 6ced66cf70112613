//! Post-hoc cascade labeling (spec §4.E).
//!
//! Runs over a completed time range of raw OI/liquidation/mark-price history
//! and emits [`LabeledCascade`] records: nothing here observes live data, so
//! unlike the cascade/absorption trackers it has no gating concern, only a
//! sliding-window detection and classification algorithm.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use tracing::{debug, info};

use crate::domain::errors::RawStoreError;
use crate::domain::raw_store::RawStore;

const OI_DROP_WINDOW_S: i64 = 60;
const MIN_LIQUIDATIONS: usize = 2;
const WAVE_GAP_S: i64 = 30;
const POST_WINDOW_MIN: i64 = 5;
const MARK_PRICE_TOLERANCE_S: i64 = 5;

fn oi_drop_threshold_pct() -> Decimal {
    dec!(10)
}

fn neutral_threshold_pct() -> Decimal {
    dec!(0.5)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Reversal,
    Continuation,
    Neutral,
    Unknown,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Reversal => "reversal",
            Outcome::Continuation => "continuation",
            Outcome::Neutral => "neutral",
            Outcome::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Wave {
    pub start_ts: i64,
    pub end_ts: i64,
    pub liquidation_count: u32,
}

/// Serializable mirror of [`Wave`], used only for the `waves_json` column.
#[derive(serde::Serialize)]
struct WaveJson {
    start_ts: i64,
    end_ts: i64,
    liquidation_count: u32,
}

impl From<&Wave> for WaveJson {
    fn from(w: &Wave) -> Self {
        Self {
            start_ts: w.start_ts,
            end_ts: w.end_ts,
            liquidation_count: w.liquidation_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabeledCascade {
    pub coin: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub oi_drop_pct: String,
    pub liquidation_count: u32,
    pub waves: Vec<Wave>,
    pub price_at_start: Option<String>,
    pub price_at_end: Option<String>,
    pub price_at_post: Option<String>,
    pub outcome: Outcome,
}

pub struct CascadeLabeler {
    store: Arc<dyn RawStore>,
}

impl CascadeLabeler {
    pub fn new(store: Arc<dyn RawStore>) -> Self {
        Self { store }
    }

    /// Run the detection algorithm for `coin` over `[start, end]`.
    pub async fn label_range(&self, coin: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<LabeledCascade>, RawStoreError> {
        let oi_snapshots = self.store.oi_history(coin, start, end).await?;
        let liquidations = self.store.liquidations_in_window(start, end, Some(coin)).await?;

        let mut labels = Vec::new();
        let mut i = 0usize;

        while i < oi_snapshots.len() {
            let start_snapshot = &oi_snapshots[i];
            let Some(start_oi) = parse_decimal(&start_snapshot.open_interest) else {
                i += 1;
                continue;
            };
            if start_oi <= Decimal::ZERO {
                i += 1;
                continue;
            }

            let window_end_ts = start_snapshot.snapshot_ts + OI_DROP_WINDOW_S * 1_000_000_000;
            let drop_target = oi_snapshots[i + 1..]
                .iter()
                .take_while(|s| s.snapshot_ts <= window_end_ts)
                .find_map(|s| {
                    let oi = parse_decimal(&s.open_interest)?;
                    let drop_pct = ((start_oi - oi) / start_oi) * dec!(100);
                    (drop_pct >= oi_drop_threshold_pct()).then_some((s, drop_pct))
                });

            let Some((end_snapshot, drop_pct)) = drop_target else {
                i += 1;
                continue;
            };

            let cascade_liquidations: Vec<_> = liquidations
                .iter()
                .filter(|l| l.detected_ts >= start_snapshot.snapshot_ts && l.detected_ts <= end_snapshot.snapshot_ts)
                .collect();

            if cascade_liquidations.len() < MIN_LIQUIDATIONS {
                i += 1;
                continue;
            }

            debug!(coin, start_ts = start_snapshot.snapshot_ts, end_ts = end_snapshot.snapshot_ts, "cascade detected");

            let waves = detect_waves(&cascade_liquidations);

            let post_ts = end_snapshot.snapshot_ts + POST_WINDOW_MIN * 60 * 1_000_000_000;
            let tolerance_ns = MARK_PRICE_TOLERANCE_S * 1_000_000_000;
            let price_at_start = self.store.mark_price_near(coin, start_snapshot.snapshot_ts, tolerance_ns).await?.map(|m| m.mark_px);
            let price_at_end = self.store.mark_price_near(coin, end_snapshot.snapshot_ts, tolerance_ns).await?.map(|m| m.mark_px);
            let price_at_post = self.store.mark_price_near(coin, post_ts, tolerance_ns).await?.map(|m| m.mark_px);

            let outcome = classify_outcome(price_at_start.as_deref(), price_at_end.as_deref(), price_at_post.as_deref());

            let waves_json = serde_json::to_string(&waves.iter().map(WaveJson::from).collect::<Vec<_>>())
                .unwrap_or_else(|_| "[]".to_string());
            self.store
                .store_labeled_cascade(crate::domain::raw_store::types::NewLabeledCascade {
                    coin: coin.to_string(),
                    start_ts: start_snapshot.snapshot_ts,
                    end_ts: end_snapshot.snapshot_ts,
                    oi_drop_pct: drop_pct.to_string(),
                    liquidation_count: cascade_liquidations.len() as u32,
                    waves_json,
                    price_at_start: price_at_start.clone(),
                    price_at_end: price_at_end.clone(),
                    price_at_post: price_at_post.clone(),
                    outcome: outcome.as_str().to_string(),
                })
                .await?;

            labels.push(LabeledCascade {
                coin: coin.to_string(),
                start_ts: start_snapshot.snapshot_ts,
                end_ts: end_snapshot.snapshot_ts,
                oi_drop_pct: drop_pct.to_string(),
                liquidation_count: cascade_liquidations.len() as u32,
                waves,
                price_at_start,
                price_at_end,
                price_at_post,
                outcome,
            });

            // Skip past every snapshot already consumed by this cascade.
            let end_idx = oi_snapshots[i..].iter().position(|s| s.snapshot_ts == end_snapshot.snapshot_ts).map(|p| i + p).unwrap_or(i);
            i = end_idx + 1;
        }

        info!(coin, count = labels.len(), "labeled cascades for range");
        Ok(labels)
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s).ok()
}

fn detect_waves(liquidations: &[&crate::domain::raw_store::types::LiquidationEvent]) -> Vec<Wave> {
    let mut sorted: Vec<_> = liquidations.to_vec();
    sorted.sort_by_key(|l| l.detected_ts);

    let mut waves: Vec<Wave> = Vec::new();
    for liq in sorted {
        match waves.last_mut() {
            Some(wave) if liq.detected_ts - wave.end_ts <= WAVE_GAP_S * 1_000_000_000 => {
                wave.end_ts = liq.detected_ts;
                wave.liquidation_count += 1;
            }
            _ => waves.push(Wave {
                start_ts: liq.detected_ts,
                end_ts: liq.detected_ts,
                liquidation_count: 1,
            }),
        }
    }
    waves
}

fn classify_outcome(start: Option<&str>, end: Option<&str>, post: Option<&str>) -> Outcome {
    let (Some(start), Some(end), Some(post)) = (start.and_then(parse_decimal), end.and_then(parse_decimal), post.and_then(parse_decimal)) else {
        return Outcome::Unknown;
    };
    if start <= Decimal::ZERO {
        return Outcome::Unknown;
    }

    let delta_cascade = end - start;
    let delta_post = post - end;
    let post_pct_of_start = (delta_post.abs() / start) * dec!(100);

    if post_pct_of_start < neutral_threshold_pct() {
        return Outcome::Neutral;
    }

    let same_direction = (delta_cascade > Decimal::ZERO && delta_post > Decimal::ZERO) || (delta_cascade < Decimal::ZERO && delta_post < Decimal::ZERO);
    if same_direction {
        Outcome::Continuation
    } else {
        Outcome::Reversal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::raw_store::types::*;
    use async_trait::async_trait;

    /// An in-memory `RawStore` used only to feed the labeler deterministic
    /// fixtures without touching a real database.
    struct FixtureStore {
        oi: Vec<OiSnapshot>,
        liquidations: Vec<LiquidationEvent>,
        mark_prices: Vec<MarkPriceSnapshot>,
    }

    #[async_trait]
    impl RawStore for FixtureStore {
        async fn start_poll_cycle(&self, _kind: CycleKind) -> Result<i64, RawStoreError> {
            Ok(1)
        }
        async fn end_poll_cycle(&self, _cycle_id: i64, _stats: &PollCycleStats) -> Result<(), RawStoreError> {
            Ok(())
        }
        async fn store_position_snapshot(&self, _s: NewPositionSnapshot) -> Result<i64, RawStoreError> {
            Ok(0)
        }
        async fn store_wallet_snapshot(&self, _s: NewWalletAccountSnapshot) -> Result<i64, RawStoreError> {
            Ok(0)
        }
        async fn store_liquidation_event(&self, _e: NewLiquidationEvent) -> Result<i64, RawStoreError> {
            Ok(0)
        }
        async fn store_oi_snapshot(&self, _s: NewOiSnapshot) -> Result<i64, RawStoreError> {
            Ok(0)
        }
        async fn store_mark_price(&self, _s: NewMarkPriceSnapshot) -> Result<i64, RawStoreError> {
            Ok(0)
        }
        async fn store_funding_snapshot(&self, _s: NewFundingSnapshot) -> Result<i64, RawStoreError> {
            Ok(0)
        }
        async fn store_wallet_discovery(
            &self,
            _wallet: &str,
            _source: DiscoverySource,
            _source_coin: Option<&str>,
            _source_value: Option<f64>,
            _source_metadata: Option<&str>,
        ) -> Result<i64, RawStoreError> {
            Ok(0)
        }
        async fn set_wallet_tier(&self, _wallet: &str, _tier: u8, _next_poll_ts: i64) -> Result<(), RawStoreError> {
            Ok(())
        }
        async fn wallets_due_for_poll(&self, _tier: u8, _now_ts: i64) -> Result<Vec<String>, RawStoreError> {
            Ok(vec![])
        }
        async fn update_wallet_poll_stats(&self, _wallet: &str, _next_poll_ts: i64, _had_positions: bool) -> Result<(), RawStoreError> {
            Ok(())
        }
        async fn get_wallet_polling_config(&self, _wallet: &str) -> Result<Option<WalletPollingConfig>, RawStoreError> {
            Ok(None)
        }
        async fn position_history(&self, _wallet: &str, _coin: &str, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<Vec<PositionSnapshot>, RawStoreError> {
            Ok(vec![])
        }
        async fn liquidations_in_window(&self, _start: DateTime<Utc>, _end: DateTime<Utc>, _coin: Option<&str>) -> Result<Vec<LiquidationEvent>, RawStoreError> {
            Ok(self.liquidations.clone())
        }
        async fn oi_history(&self, _coin: &str, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<Vec<OiSnapshot>, RawStoreError> {
            Ok(self.oi.clone())
        }
        async fn mark_price_near(&self, coin: &str, ts: i64, tolerance_ns: i64) -> Result<Option<MarkPriceSnapshot>, RawStoreError> {
            Ok(self
                .mark_prices
                .iter()
                .filter(|m| m.coin == coin && (m.snapshot_ts - ts).abs() <= tolerance_ns)
                .min_by_key(|m| (m.snapshot_ts - ts).abs())
                .cloned())
        }
        async fn store_labeled_cascade(&self, _cascade: NewLabeledCascade) -> Result<i64, RawStoreError> {
            Ok(0)
        }
        async fn labeled_cascades_for_coin(&self, _coin: &str, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<Vec<LabeledCascadeRecord>, RawStoreError> {
            Ok(vec![])
        }
    }

    fn oi(ts_s: i64, value: &str) -> OiSnapshot {
        OiSnapshot {
            id: 0,
            snapshot_ts: ts_s * 1_000_000_000,
            coin: "BTC".to_string(),
            open_interest: value.to_string(),
            funding_rate: None,
            premium: None,
            day_ntl_vlm: None,
        }
    }

    fn liq(ts_s: i64) -> LiquidationEvent {
        LiquidationEvent {
            id: 0,
            detected_ts: ts_s * 1_000_000_000,
            wallet: "0xabc".to_string(),
            coin: "BTC".to_string(),
            last_known_szi: "1.0".to_string(),
            last_known_entry_px: "50000".to_string(),
            last_known_liquidation_px: None,
            last_known_position_value: None,
            last_known_unrealized_pnl: None,
            prev_snapshot_id: None,
        }
    }

    fn mark(ts_s: i64, px: &str) -> MarkPriceSnapshot {
        MarkPriceSnapshot {
            id: 0,
            snapshot_ts: ts_s * 1_000_000_000,
            coin: "BTC".to_string(),
            mark_px: px.to_string(),
            oracle_px: None,
        }
    }

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        (DateTime::from_timestamp(0, 0).unwrap(), DateTime::from_timestamp(1_000_000, 0).unwrap())
    }

    #[test]
    fn wave_detection_splits_on_gaps_over_30s() {
        let events: Vec<LiquidationEvent> = [0, 5, 45, 50, 55, 105].iter().map(|&t| liq(t)).collect();
        let refs: Vec<&LiquidationEvent> = events.iter().collect();
        let waves = detect_waves(&refs);

        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0].liquidation_count, 2);
        assert_eq!(waves[1].liquidation_count, 3);
        assert_eq!(waves[2].liquidation_count, 1);
        let (largest_wave_idx, _) = waves.iter().enumerate().max_by_key(|(_, w)| w.liquidation_count).unwrap();
        assert_eq!(largest_wave_idx, 1);
    }

    #[tokio::test]
    async fn detects_cascade_and_counts_its_liquidations() {
        let store: Arc<dyn RawStore> = Arc::new(FixtureStore {
            oi: vec![oi(0, "1000000"), oi(55, "880000")],
            liquidations: vec![liq(0), liq(5), liq(45), liq(50), liq(55), liq(105)],
            mark_prices: vec![mark(0, "50000"), mark(55, "49000"), mark(355, "49900")],
        });
        let labeler = CascadeLabeler::new(store);
        let (start, end) = range();
        let labels = labeler.label_range("BTC", start, end).await.unwrap();

        assert_eq!(labels.len(), 1);
        let label = &labels[0];
        assert_eq!(label.liquidation_count, 5);
        assert_eq!(label.waves.iter().map(|w| w.liquidation_count).sum::<u32>(), label.liquidation_count);
        assert_eq!(label.outcome, Outcome::Reversal);
    }

    #[tokio::test]
    async fn fewer_than_two_liquidations_is_not_a_cascade() {
        let store: Arc<dyn RawStore> = Arc::new(FixtureStore {
            oi: vec![oi(0, "1000000"), oi(30, "880000")],
            liquidations: vec![liq(0)],
            mark_prices: vec![],
        });
        let labeler = CascadeLabeler::new(store);
        let (start, end) = range();
        let labels = labeler.label_range("BTC", start, end).await.unwrap();
        assert!(labels.is_empty());
    }

    #[tokio::test]
    async fn missing_mark_price_yields_unknown_outcome() {
        let store: Arc<dyn RawStore> = Arc::new(FixtureStore {
            oi: vec![oi(0, "1000000"), oi(30, "880000")],
            liquidations: vec![liq(0), liq(10)],
            mark_prices: vec![],
        });
        let labeler = CascadeLabeler::new(store);
        let (start, end) = range();
        let labels = labeler.label_range("BTC", start, end).await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].outcome, Outcome::Unknown);
    }

    #[test]
    fn classify_reversal_when_post_move_opposes_cascade() {
        let outcome = classify_outcome(Some("50000"), Some("49000"), Some("49900"));
        assert_eq!(outcome, Outcome::Reversal);
    }

    #[test]
    fn classify_continuation_when_post_move_agrees() {
        let outcome = classify_outcome(Some("50000"), Some("49000"), Some("48500"));
        assert_eq!(outcome, Outcome::Continuation);
    }

    #[test]
    fn classify_neutral_when_post_move_is_small() {
        let outcome = classify_outcome(Some("50000"), Some("49000"), Some("49010"));
        assert_eq!(outcome, Outcome::Neutral);
    }
}
