//! Deterministic in-memory exchange adapter.
//!
//! Driven entirely by caller-fed fixtures; sufficient to exercise the tiered
//! poller and the cascade/absorption observers end-to-end without a live
//! venue. Mirrors the teacher's `infrastructure::mock` pattern of a
//! `RwLock`-guarded in-memory double rather than a mocking framework.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    ClearinghouseState, CoinContext, ExchangeAdapter, ExchangeError, ExchangeResult, L2Book, Trade,
    UserEvent,
};

#[derive(Debug, Default)]
struct MockState {
    clearinghouse: HashMap<String, ClearinghouseState>,
    coin_context: HashMap<String, CoinContext>,
    books: HashMap<String, L2Book>,
    trades: HashMap<String, Vec<Trade>>,
    user_events: HashMap<String, Vec<UserEvent>>,
}

/// An in-memory stand-in for a real venue. Tests and local runs seed it via
/// the `set_*`/`push_*` methods, then drive the poller or observers against it.
#[derive(Clone, Default)]
pub struct MockExchangeAdapter {
    state: Arc<RwLock<MockState>>,
}

impl MockExchangeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_clearinghouse_state(&self, wallet: &str, state: ClearinghouseState) {
        self.state
            .write()
            .await
            .clearinghouse
            .insert(wallet.to_lowercase(), state);
    }

    pub async fn set_coin_context(&self, coin: &str, ctx: CoinContext) {
        self.state
            .write()
            .await
            .coin_context
            .insert(coin.to_string(), ctx);
    }

    pub async fn set_l2_book(&self, coin: &str, book: L2Book) {
        self.state.write().await.books.insert(coin.to_string(), book);
    }

    pub async fn push_trade(&self, coin: &str, trade: Trade) {
        self.state
            .write()
            .await
            .trades
            .entry(coin.to_string())
            .or_default()
            .push(trade);
    }

    pub async fn push_user_event(&self, wallet: &str, event: UserEvent) {
        self.state
            .write()
            .await
            .user_events
            .entry(wallet.to_lowercase())
            .or_default()
            .push(event);
    }

    /// Remove a wallet's positions, simulating a liquidation-driven disappearance.
    pub async fn clear_clearinghouse_state(&self, wallet: &str) {
        self.state.write().await.clearinghouse.remove(&wallet.to_lowercase());
    }
}

#[async_trait]
impl ExchangeAdapter for MockExchangeAdapter {
    async fn clearinghouse_state(&self, wallet: &str) -> ExchangeResult<ClearinghouseState> {
        Ok(self
            .state
            .read()
            .await
            .clearinghouse
            .get(&wallet.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn coin_context(&self, coin: &str) -> ExchangeResult<CoinContext> {
        self.state
            .read()
            .await
            .coin_context
            .get(coin)
            .cloned()
            .ok_or_else(|| ExchangeError::Malformed {
                reason: format!("no fixture for coin {coin}"),
            })
    }

    async fn l2_book(&self, coin: &str) -> ExchangeResult<L2Book> {
        self.state
            .read()
            .await
            .books
            .get(coin)
            .cloned()
            .ok_or_else(|| ExchangeError::Malformed {
                reason: format!("no fixture for coin {coin}"),
            })
    }

    async fn recent_trades(&self, coin: &str) -> ExchangeResult<Vec<Trade>> {
        Ok(self
            .state
            .read()
            .await
            .trades
            .get(coin)
            .cloned()
            .unwrap_or_default())
    }

    async fn recent_user_events(&self, wallet: &str) -> ExchangeResult<Vec<UserEvent>> {
        Ok(self
            .state
            .read()
            .await
            .user_events
            .get(&wallet.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}
