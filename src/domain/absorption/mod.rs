//! Regime-adaptive absorption confirmation.
//!
//! Observes trades, order-book snapshots, and explicit absorption/refill
//! events per coin, and answers one question at query time: has resting
//! liquidity been absorbing aggressive flow without the price moving
//! proportionally? The answer is always relative to the coin's own recent
//! regime (volatility, trade rate, spread), never a fixed cutoff.

mod config;
mod percentile;
mod regime;

pub use config::AbsorptionConfig;
pub use regime::RegimeContext;

use std::collections::HashMap;
use percentile::PercentileHistory;

/// A trade tick.
#[derive(Debug, Clone, Copy)]
pub struct TradeTick {
    pub timestamp_ns: i64,
    pub price: f64,
    pub volume: f64,
    pub is_sell: bool,
}

/// An order-book snapshot summary.
#[derive(Debug, Clone, Copy)]
pub struct BookSnapshot {
    pub timestamp_ns: i64,
    pub total_bid_size: f64,
    pub total_ask_size: f64,
    pub mid: f64,
    pub spread: f64,
}

/// An explicit absorption event: some size was consumed with a given price move.
#[derive(Debug, Clone, Copy)]
pub struct AbsorptionEvent {
    pub timestamp_ns: i64,
    pub consumed_size: f64,
    pub price_move_pct: f64,
}

/// An explicit refill event: resting size was added back.
#[derive(Debug, Clone, Copy)]
pub struct RefillEvent {
    pub timestamp_ns: i64,
    pub added_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsorptionPhase {
    None,
    Weak,
    Moderate,
    Strong,
}

impl AbsorptionPhase {
    pub fn from_signal_count(n: u8) -> Self {
        match n {
            0 => AbsorptionPhase::None,
            1 => AbsorptionPhase::Weak,
            2 => AbsorptionPhase::Moderate,
            _ => AbsorptionPhase::Strong,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, AbsorptionPhase::Moderate | AbsorptionPhase::Strong)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AbsorptionObservation {
    pub phase: AbsorptionPhase,
    pub absorption_ratio_percentile: f64,
    pub replenishment_ratio: f64,
    pub aggressor_failure: bool,
    pub delta_slope_normalized: f64,
    pub signal_count: u8,
}

const LOOKBACK_NS: i64 = 30_000_000_000;

#[derive(Debug, Default)]
struct CoinBuffer {
    trades: Vec<TradeTick>,
    books: Vec<BookSnapshot>,
    absorptions: Vec<AbsorptionEvent>,
    refills: Vec<RefillEvent>,
    ratio_history: PercentileHistory,
    sell_volume_history: PercentileHistory,
}

impl CoinBuffer {
    fn evict_older_than(&mut self, now: i64, window_ns: i64) {
        self.trades.retain(|t| now - t.timestamp_ns <= window_ns);
        self.books.retain(|b| now - b.timestamp_ns <= window_ns);
        self.absorptions.retain(|a| now - a.timestamp_ns <= window_ns);
        self.refills.retain(|r| now - r.timestamp_ns <= window_ns);
    }
}

/// Per-coin regime-adaptive absorption tracker.
#[derive(Default)]
pub struct AbsorptionTracker {
    config: AbsorptionConfig,
    coins: HashMap<String, CoinBuffer>,
}

impl AbsorptionTracker {
    pub fn new(config: AbsorptionConfig) -> Self {
        Self {
            config,
            coins: HashMap::new(),
        }
    }

    pub fn record_trade(&mut self, coin: &str, tick: TradeTick) {
        let buf = self.coins.entry(coin.to_string()).or_default();
        buf.evict_older_than(tick.timestamp_ns, LOOKBACK_NS);
        buf.trades.push(tick);
    }

    pub fn record_book(&mut self, coin: &str, snap: BookSnapshot) {
        let buf = self.coins.entry(coin.to_string()).or_default();
        buf.evict_older_than(snap.timestamp_ns, LOOKBACK_NS);
        buf.books.push(snap);
    }

    pub fn record_absorption(&mut self, coin: &str, event: AbsorptionEvent) {
        let buf = self.coins.entry(coin.to_string()).or_default();
        buf.absorptions.push(event);
    }

    pub fn record_refill(&mut self, coin: &str, event: RefillEvent) {
        let buf = self.coins.entry(coin.to_string()).or_default();
        buf.refills.push(event);
    }

    /// Compute the regime context for a coin over the last 30s, as of `now`.
    pub fn regime_context(&self, coin: &str, now: i64) -> RegimeContext {
        match self.coins.get(coin) {
            Some(buf) => regime::compute(buf_trades_in_window(&buf.trades, now), buf_books_in_window(&buf.books, now)),
            None => RegimeContext::empty(),
        }
    }

    /// Evaluate the four confirmation signals over the coin's adaptive
    /// window and return the resulting observation. This mutates the
    /// per-coin percentile histories (bounded to 100 entries).
    pub fn evaluate(&mut self, coin: &str, now: i64) -> AbsorptionObservation {
        let regime = self.regime_context(coin, now);
        let window_ns = (regime.adaptive_window_s * 1_000_000_000.0) as i64;

        let buf = self.coins.entry(coin.to_string()).or_default();
        let trades_in_w: Vec<&TradeTick> = buf
            .trades
            .iter()
            .filter(|t| now - t.timestamp_ns <= window_ns)
            .collect();

        if trades_in_w.is_empty() {
            return AbsorptionObservation {
                phase: AbsorptionPhase::None,
                absorption_ratio_percentile: 0.0,
                replenishment_ratio: 0.0,
                aggressor_failure: false,
                delta_slope_normalized: 0.0,
                signal_count: 0,
            };
        }

        let consumed: f64 = buf
            .absorptions
            .iter()
            .filter(|a| now - a.timestamp_ns <= window_ns)
            .map(|a| a.consumed_size)
            .sum();
        let refilled: f64 = buf
            .refills
            .iter()
            .filter(|r| now - r.timestamp_ns <= window_ns)
            .map(|r| r.added_size)
            .sum();
        let price_moved: f64 = buf
            .absorptions
            .iter()
            .filter(|a| now - a.timestamp_ns <= window_ns)
            .map(|a| a.price_move_pct.abs())
            .sum();
        let event_count = buf
            .absorptions
            .iter()
            .filter(|a| now - a.timestamp_ns <= window_ns)
            .count() as f64;

        let half_spread_noise = regime.avg_spread_bps / 2.0;
        let denom = (price_moved + half_spread_noise * event_count).max(self.config.epsilon);
        let volatility_factor = (regime.price_range_bps / 100.0).max(self.config.epsilon);
        let ratio = (consumed / denom) / volatility_factor;
        buf.ratio_history.push(ratio);
        let ratio_percentile = buf.ratio_history.percentile_of(ratio);
        let signal_absorption_ratio = ratio_percentile >= 70.0;

        let replenishment_ratio = if consumed > 0.0 { refilled / consumed } else { 0.0 };
        let signal_replenishment = replenishment_ratio >= 0.30;

        let sell_volume: f64 = trades_in_w.iter().filter(|t| t.is_sell).map(|t| t.volume).sum();
        buf.sell_volume_history.push(sell_volume);
        let sell_volume_percentile = buf.sell_volume_history.percentile_of(sell_volume);

        let sell_range_bps = price_range_bps(trades_in_w.iter().filter(|t| t.is_sell).map(|t| t.price));
        let expected_range = (regime.atr_proxy * regime.adaptive_window_s).max(self.config.epsilon);
        let signal_aggressor_failure =
            (sell_range_bps / 100.0 / expected_range) < 0.5 && sell_volume_percentile >= 60.0;

        let mid_ts = now - window_ns / 2;
        let (first_half, second_half): (Vec<&TradeTick>, Vec<&TradeTick>) =
            trades_in_w.iter().partition(|t| t.timestamp_ns < mid_ts);
        let delta = |ticks: &[&TradeTick]| -> f64 {
            ticks
                .iter()
                .map(|t| if t.is_sell { -t.volume } else { t.volume })
                .sum()
        };
        let total_volume: f64 = trades_in_w.iter().map(|t| t.volume).sum();
        let slope = (delta(&second_half) - delta(&first_half)) / total_volume.max(self.config.epsilon);
        let signal_delta_divergence = slope.abs() <= 0.15 && sell_volume_percentile >= 60.0;

        let mut signal_count = 0u8;
        if signal_absorption_ratio {
            signal_count += 1;
        }
        if signal_replenishment {
            signal_count += 1;
        }
        if signal_aggressor_failure {
            signal_count += 1;
        }
        if signal_delta_divergence {
            signal_count += 1;
        }

        AbsorptionObservation {
            phase: AbsorptionPhase::from_signal_count(signal_count),
            absorption_ratio_percentile: ratio_percentile,
            replenishment_ratio,
            aggressor_failure: signal_aggressor_failure,
            delta_slope_normalized: slope,
            signal_count,
        }
    }

    /// Whether the coin's most recently evaluated state confirms a cascade
    /// exhaustion, i.e. phase is at least moderate. Re-evaluates from the
    /// current buffer as of `now`.
    pub fn confirms_exhaustion(&mut self, coin: &str, now: i64) -> bool {
        self.evaluate(coin, now).phase.is_confirmed()
    }
}

fn buf_trades_in_window(trades: &[TradeTick], now: i64) -> Vec<TradeTick> {
    trades
        .iter()
        .copied()
        .filter(|t| now - t.timestamp_ns <= LOOKBACK_NS)
        .collect()
}

fn buf_books_in_window(books: &[BookSnapshot], now: i64) -> Vec<BookSnapshot> {
    books
        .iter()
        .copied()
        .filter(|b| now - b.timestamp_ns <= LOOKBACK_NS)
        .collect()
}

fn price_range_bps<I: Iterator<Item = f64>>(prices: I) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut any = false;
    for p in prices {
        any = true;
        min = min.min(p);
        max = max.max(p);
    }
    if !any || min <= 0.0 {
        return 0.0;
    }
    (max - min) / min * 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_trades_in_window_yields_none_phase() {
        let mut tracker = AbsorptionTracker::new(AbsorptionConfig::default());
        let obs = tracker.evaluate("BTC", 1_000_000_000);
        assert_eq!(obs.phase, AbsorptionPhase::None);
        assert_eq!(obs.signal_count, 0);
    }

    #[test]
    fn phase_thresholds_match_signal_count() {
        assert_eq!(AbsorptionPhase::from_signal_count(0), AbsorptionPhase::None);
        assert_eq!(AbsorptionPhase::from_signal_count(1), AbsorptionPhase::Weak);
        assert_eq!(AbsorptionPhase::from_signal_count(2), AbsorptionPhase::Moderate);
        assert_eq!(AbsorptionPhase::from_signal_count(3), AbsorptionPhase::Strong);
        assert_eq!(AbsorptionPhase::from_signal_count(4), AbsorptionPhase::Strong);
    }

    #[test]
    fn moderate_and_strong_are_confirmed() {
        assert!(!AbsorptionPhase::None.is_confirmed());
        assert!(!AbsorptionPhase::Weak.is_confirmed());
        assert!(AbsorptionPhase::Moderate.is_confirmed());
        assert!(AbsorptionPhase::Strong.is_confirmed());
    }
}
