//! Shape/bounds/staleness checks for raw venue data (spec §7 "malformed
//! upstream payload" and "capacity" taxonomy: rejected inputs are dropped
//! from the observation stream and counted, never raised as exceptions).

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use tracing::warn;

use crate::domain::exchange::{BookLevel, CoinContext, L2Book, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    NonPositivePrice,
    NegativeSize,
    UnparseableNumber,
    CrossedBook,
    Stale,
}

#[derive(Debug, Clone)]
pub struct DataQualityConfig {
    /// Maximum age, in nanoseconds, a venue timestamp may lag "now" before
    /// the reading is considered stale. `None` disables the staleness check
    /// (useful for replaying historical fixtures).
    pub max_staleness_ns: Option<i64>,
}

impl Default for DataQualityConfig {
    fn default() -> Self {
        Self {
            // 30s: generous enough for tier-3 polling cadence, tight enough
            // to catch a wedged websocket feed.
            max_staleness_ns: Some(30_000_000_000),
        }
    }
}

/// Counts and logs rejected payloads; never panics or propagates an error
/// past its own boundary.
#[derive(Debug, Default)]
pub struct MarketDataValidator {
    config_staleness_ns: Option<i64>,
    rejected_count: AtomicU64,
}

impl MarketDataValidator {
    pub fn new(config: DataQualityConfig) -> Self {
        Self {
            config_staleness_ns: config.max_staleness_ns,
            rejected_count: AtomicU64::new(0),
        }
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    fn reject(&self, context: &str, reason: RejectionReason) -> RejectionReason {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
        warn!(context, ?reason, "dropped malformed market data payload");
        reason
    }

    fn parse_positive(&self, context: &str, raw: &str) -> Result<Decimal, RejectionReason> {
        let Ok(value) = Decimal::from_str(raw) else {
            return Err(self.reject(context, RejectionReason::UnparseableNumber));
        };
        if value <= Decimal::ZERO {
            return Err(self.reject(context, RejectionReason::NonPositivePrice));
        }
        Ok(value)
    }

    fn parse_non_negative(&self, context: &str, raw: &str) -> Result<Decimal, RejectionReason> {
        let Ok(value) = Decimal::from_str(raw) else {
            return Err(self.reject(context, RejectionReason::UnparseableNumber));
        };
        if value < Decimal::ZERO {
            return Err(self.reject(context, RejectionReason::NegativeSize));
        }
        Ok(value)
    }

    fn check_staleness(&self, context: &str, timestamp_ns: i64, now_ns: i64) -> Result<(), RejectionReason> {
        if let Some(max) = self.config_staleness_ns
            && now_ns - timestamp_ns > max
        {
            return Err(self.reject(context, RejectionReason::Stale));
        }
        Ok(())
    }

    /// Price and size must parse and be positive; staleness is checked
    /// against `now_ns`.
    pub fn validate_trade(&self, trade: &Trade, now_ns: i64) -> Result<(), RejectionReason> {
        self.parse_positive("trade.price", &trade.price)?;
        self.parse_positive("trade.size", &trade.size)?;
        self.check_staleness("trade.timestamp", trade.timestamp, now_ns)
    }

    /// Mark price and open interest must be positive; funding rate, if
    /// present, is unbounded (can be negative) so it isn't checked.
    pub fn validate_coin_context(&self, ctx: &CoinContext) -> Result<(), RejectionReason> {
        self.parse_positive("coin_context.mark_px", &ctx.mark_px)?;
        self.parse_non_negative("coin_context.open_interest", &ctx.open_interest)?;
        Ok(())
    }

    /// Every level must have a positive price and non-negative size; the
    /// best bid must be below the best ask (a crossed book is a malformed
    /// snapshot, not a trading opportunity).
    pub fn validate_l2_book(&self, book: &L2Book) -> Result<(), RejectionReason> {
        for level in book.bids.iter().chain(book.asks.iter()) {
            self.parse_positive("book.level.price", &level.price)?;
            self.parse_non_negative("book.level.size", &level.size)?;
        }
        if let (Some(best_bid), Some(best_ask)) = (best_price(&book.bids, true), best_price(&book.asks, false))
            && best_bid >= best_ask
        {
            return Err(self.reject("book.crossed", RejectionReason::CrossedBook));
        }
        Ok(())
    }
}

fn best_price(levels: &[BookLevel], highest: bool) -> Option<Decimal> {
    levels
        .iter()
        .filter_map(|l| Decimal::from_str(&l.price).ok())
        .fold(None, |acc, p| match acc {
            None => Some(p),
            Some(best) if highest && p > best => Some(p),
            Some(best) if !highest && p < best => Some(p),
            Some(best) => Some(best),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(price: &str, size: &str, ts: i64) -> Trade {
        Trade {
            coin: "BTC".to_string(),
            timestamp: ts,
            price: price.to_string(),
            size: size.to_string(),
            is_sell: false,
            wallet: None,
        }
    }

    fn level(price: &str, size: &str) -> BookLevel {
        BookLevel {
            price: price.to_string(),
            size: size.to_string(),
        }
    }

    #[test]
    fn negative_price_is_rejected() {
        let v = MarketDataValidator::new(DataQualityConfig::default());
        let t = trade("-1", "1", 0);
        assert_eq!(v.validate_trade(&t, 0), Err(RejectionReason::NonPositivePrice));
        assert_eq!(v.rejected_count(), 1);
    }

    #[test]
    fn unparseable_number_is_rejected() {
        let v = MarketDataValidator::new(DataQualityConfig::default());
        let t = trade("not-a-number", "1", 0);
        assert_eq!(v.validate_trade(&t, 0), Err(RejectionReason::UnparseableNumber));
    }

    #[test]
    fn stale_trade_is_rejected() {
        let v = MarketDataValidator::new(DataQualityConfig {
            max_staleness_ns: Some(1_000_000_000),
        });
        let t = trade("50000", "1", 0);
        assert_eq!(v.validate_trade(&t, 5_000_000_000), Err(RejectionReason::Stale));
    }

    #[test]
    fn staleness_check_disabled_when_none() {
        let v = MarketDataValidator::new(DataQualityConfig { max_staleness_ns: None });
        let t = trade("50000", "1", 0);
        assert!(v.validate_trade(&t, 999_999_999_999).is_ok());
    }

    #[test]
    fn crossed_book_is_rejected() {
        let v = MarketDataValidator::new(DataQualityConfig::default());
        let book = L2Book {
            coin: "BTC".to_string(),
            timestamp: 0,
            bids: vec![level("50100", "1")],
            asks: vec![level("50000", "1")],
        };
        assert_eq!(v.validate_l2_book(&book), Err(RejectionReason::CrossedBook));
    }

    #[test]
    fn valid_book_passes() {
        let v = MarketDataValidator::new(DataQualityConfig::default());
        let book = L2Book {
            coin: "BTC".to_string(),
            timestamp: 0,
            bids: vec![level("49900", "1")],
            asks: vec![level("50000", "1")],
        };
        assert!(v.validate_l2_book(&book).is_ok());
    }

    #[test]
    fn coin_context_requires_positive_mark_price() {
        let v = MarketDataValidator::new(DataQualityConfig::default());
        let ctx = CoinContext {
            coin: "BTC".to_string(),
            mark_px: "0".to_string(),
            oracle_px: None,
            open_interest: "100".to_string(),
            funding_rate: None,
            premium: None,
            day_ntl_vlm: None,
            next_funding_ts: None,
        };
        assert_eq!(v.validate_coin_context(&ctx), Err(RejectionReason::NonPositivePrice));
    }
}
