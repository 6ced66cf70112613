//! End-to-end: a wallet gets an open position, the poller snapshots it, the
//! position disappears on the venue, and the next poll of the same tier
//! derives a liquidation event purely from the coin-set diff.

use std::sync::Arc;

use hl_cascade_watch::domain::exchange::mock::MockExchangeAdapter;
use hl_cascade_watch::domain::exchange::{ClearinghouseState, RawPosition};
use hl_cascade_watch::domain::raw_store::RawStore;
use hl_cascade_watch::domain::raw_store::types::DiscoverySource;
use hl_cascade_watch::domain::wallet_poller::{PollerConfig, TieredPoller};
use hl_cascade_watch::infrastructure::persistence::SqliteRawStore;
use chrono::{DateTime, Utc};

fn position(coin: &str) -> RawPosition {
    RawPosition {
        coin: coin.to_string(),
        szi: "2.5".to_string(),
        entry_px: "3000".to_string(),
        liquidation_px: Some("2500".to_string()),
        leverage_kind: Some("cross".to_string()),
        leverage_value: Some("5".to_string()),
        margin_used: Some("1500".to_string()),
        position_value: Some("7500".to_string()),
        unrealized_pnl: Some("-50".to_string()),
    }
}

#[tokio::test]
async fn position_disappearance_is_recorded_as_a_liquidation() {
    let store: Arc<SqliteRawStore> = Arc::new(SqliteRawStore::connect("sqlite::memory:").await.unwrap());
    let exchange = Arc::new(MockExchangeAdapter::new());
    let config = PollerConfig {
        tier3_interval_s: 0.02,
        ..PollerConfig::default()
    };
    let poller = TieredPoller::new(config, store.clone(), exchange.clone());

    exchange
        .set_clearinghouse_state(
            "0xWALLET",
            ClearinghouseState {
                account_value: Some("50000".to_string()),
                total_margin_used: Some("1500".to_string()),
                withdrawable: Some("48500".to_string()),
                positions: vec![position("ETH")],
            },
        )
        .await;

    poller
        .add_wallet("0xWALLET", 3, DiscoverySource::Manual, None, None)
        .await
        .unwrap();

    let first = poller.run_tier3_poll().await.unwrap();
    assert_eq!(first.wallets_polled, 1);
    assert_eq!(first.positions_found, 1);
    assert_eq!(first.liquidations_detected, 0);

    exchange.clear_clearinghouse_state("0xWALLET").await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let second = poller.run_tier3_poll().await.unwrap();
    assert_eq!(second.wallets_polled, 1);
    assert_eq!(second.positions_found, 0);
    assert_eq!(second.liquidations_detected, 1);

    let history = store
        .position_history(
            "0xwallet",
            "ETH",
            DateTime::<Utc>::from_timestamp_nanos(0),
            DateTime::<Utc>::from_timestamp_nanos(i64::MAX),
        )
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry_px, "3000");

    let liquidations = store
        .liquidations_in_window(
            DateTime::<Utc>::from_timestamp_nanos(0),
            DateTime::<Utc>::from_timestamp_nanos(i64::MAX),
            None,
        )
        .await
        .unwrap();
    assert_eq!(liquidations.len(), 1);
    assert_eq!(liquidations[0].last_known_entry_px, "3000");
    assert_eq!(liquidations[0].prev_snapshot_id, Some(history[0].id));
}

#[tokio::test]
async fn promoted_wallet_is_rescheduled_on_its_new_tier_interval() {
    let store: Arc<SqliteRawStore> = Arc::new(SqliteRawStore::connect("sqlite::memory:").await.unwrap());
    let exchange = Arc::new(MockExchangeAdapter::new());
    let config = PollerConfig {
        tier2_interval_s: 30.0,
        tier3_interval_s: 0.02,
        ..PollerConfig::default()
    };
    let poller = TieredPoller::new(config, store.clone(), exchange.clone());

    exchange
        .set_clearinghouse_state(
            "0xWHALE",
            ClearinghouseState {
                account_value: Some("600000".to_string()),
                total_margin_used: Some("100000".to_string()),
                withdrawable: Some("500000".to_string()),
                positions: vec![RawPosition {
                    position_value: Some("500000".to_string()),
                    ..position("ETH")
                }],
            },
        )
        .await;
    poller
        .add_wallet("0xWHALE", 3, DiscoverySource::Manual, None, None)
        .await
        .unwrap();
    poller.run_tier3_poll().await.unwrap();
    assert_eq!(poller.tier_count(3).await, 1);
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    // Same wallet observed at $2M on its next tier-3 poll: promoted to tier
    // 2 on this cycle, and its next poll must use the 30s tier-2 interval,
    // not the 0.02s tier-3 interval it was just polled under.
    exchange
        .set_clearinghouse_state(
            "0xWHALE",
            ClearinghouseState {
                account_value: Some("2100000".to_string()),
                total_margin_used: Some("100000".to_string()),
                withdrawable: Some("2000000".to_string()),
                positions: vec![RawPosition {
                    position_value: Some("2000000".to_string()),
                    ..position("ETH")
                }],
            },
        )
        .await;
    poller.run_tier3_poll().await.unwrap();
    assert_eq!(poller.tier_count(3).await, 0);
    assert_eq!(poller.tier_count(2).await, 1);

    // 60s out is due under the 30s tier-2 interval it was promoted onto, but
    // would not yet be due under the 300s tier-3 interval it was polled
    // under this cycle.
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as i64;
    let due = store.wallets_due_for_poll(2, now + 60_000_000_000).await.unwrap();
    assert!(due.contains(&"0xwhale".to_string()));
}

#[tokio::test]
async fn discovery_enqueues_wallets_above_the_notional_floor() {
    let store: Arc<SqliteRawStore> = Arc::new(SqliteRawStore::connect("sqlite::memory:").await.unwrap());
    let exchange = Arc::new(MockExchangeAdapter::new());
    let config = PollerConfig {
        discovery_coins: vec!["BTC".to_string()],
        discovery_min_value_usd: 10_000.0,
        ..PollerConfig::default()
    };
    let poller = TieredPoller::new(config, store, exchange.clone());

    exchange
        .push_trade(
            "BTC",
            hl_cascade_watch::domain::exchange::Trade {
                coin: "BTC".to_string(),
                timestamp: 0,
                price: "60000".to_string(),
                size: "1.0".to_string(),
                is_sell: false,
                wallet: Some("0xBIGWALLET".to_string()),
            },
        )
        .await;
    exchange
        .push_trade(
            "BTC",
            hl_cascade_watch::domain::exchange::Trade {
                coin: "BTC".to_string(),
                timestamp: 0,
                price: "60000".to_string(),
                size: "0.01".to_string(),
                is_sell: false,
                wallet: Some("0xSMALLWALLET".to_string()),
            },
        )
        .await;

    let discovered = poller.run_discovery().await.unwrap();
    assert_eq!(discovered, 1);
    assert_eq!(poller.tier_count(3).await, 1);
}
