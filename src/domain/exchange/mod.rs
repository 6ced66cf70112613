//! Upstream venue normalization.
//!
//! Exchanges expose per-wallet clearinghouse state, per-coin active context,
//! L2 order books, trades, and user events. This module defines the shapes
//! those responses are normalized into and the adapter trait that produces
//! them; the only shipped implementation beyond the trait is a deterministic
//! in-memory mock. A real HTTP/WebSocket venue client is a downstream concern.

pub mod mock;

use async_trait::async_trait;

/// A single open position as reported by the venue, string-typed exactly as
/// received so the tiered poller can forward it into the raw store untouched.
#[derive(Debug, Clone)]
pub struct RawPosition {
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

/// Per-wallet clearinghouse state: margin summary plus open positions.
#[derive(Debug, Clone, Default)]
pub struct ClearinghouseState {
    pub account_value: Option<String>,
    pub total_margin_used: Option<String>,
    pub withdrawable: Option<String>,
    pub positions: Vec<RawPosition>,
}

/// Per-coin active context: mark price, open interest, funding, premium.
#[derive(Debug, Clone)]
pub struct CoinContext {
    pub coin: String,
    pub mark_px: String,
    pub oracle_px: Option<String>,
    pub open_interest: String,
    pub funding_rate: Option<String>,
    pub premium: Option<String>,
    pub day_ntl_vlm: Option<String>,
    pub next_funding_ts: Option<i64>,
}

/// One price level on a side of the book.
#[derive(Debug, Clone)]
pub struct BookLevel {
    pub price: String,
    pub size: String,
}

/// L2 order book snapshot for a coin.
#[derive(Debug, Clone)]
pub struct L2Book {
    pub coin: String,
    pub timestamp: i64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// A single executed trade.
#[derive(Debug, Clone)]
pub struct Trade {
    pub coin: String,
    pub timestamp: i64,
    pub price: String,
    pub size: String,
    pub is_sell: bool,
    pub wallet: Option<String>,
}

/// A user-scoped event: a fill or a liquidation notice straight from the venue.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    Fill {
        wallet: String,
        coin: String,
        price: String,
        size: String,
        is_sell: bool,
        timestamp: i64,
    },
    Liquidation {
        wallet: String,
        coin: String,
        timestamp: i64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("request failed for wallet {wallet}: {reason}")]
    RequestFailed { wallet: String, reason: String },
    #[error("malformed response: {reason}")]
    Malformed { reason: String },
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Normalizes an upstream venue into the shapes above. Implementations own
/// their own transport (HTTP/WebSocket); the core ships only the mock.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn clearinghouse_state(&self, wallet: &str) -> ExchangeResult<ClearinghouseState>;

    async fn coin_context(&self, coin: &str) -> ExchangeResult<CoinContext>;

    async fn l2_book(&self, coin: &str) -> ExchangeResult<L2Book>;

    async fn recent_trades(&self, coin: &str) -> ExchangeResult<Vec<Trade>>;

    async fn recent_user_events(&self, wallet: &str) -> ExchangeResult<Vec<UserEvent>>;
}
