//! Thin runner wiring the tiered wallet poller to a SQLite raw store and the
//! shipped mock exchange adapter. Contains no core logic of its own — see
//! `domain::wallet_poller`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::time::interval;
use tracing::{error, info};

use hl_cascade_watch::config::AppConfig;
use hl_cascade_watch::domain::exchange::mock::MockExchangeAdapter;
use hl_cascade_watch::domain::wallet_poller::TieredPoller;
use hl_cascade_watch::infrastructure::persistence::SqliteRawStore;

#[derive(Parser, Debug)]
#[command(about = "Tiered wallet poller runner")]
struct Args {
    /// Override DATABASE_URL from the environment.
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    let store: Arc<SqliteRawStore> = Arc::new(SqliteRawStore::connect(&config.database_url).await?);
    let exchange = Arc::new(MockExchangeAdapter::new());
    let poller = Arc::new(TieredPoller::new(config.poller.clone(), store, exchange));

    info!("poller starting");

    let t1 = spawn_tier_loop(poller.clone(), 1, config.poller.tier1_interval_s);
    let t2 = spawn_tier_loop(poller.clone(), 2, config.poller.tier2_interval_s);
    let t3 = spawn_tier_loop(poller.clone(), 3, config.poller.tier3_interval_s);
    let discovery = spawn_discovery_loop(poller.clone(), config.poller.discovery_interval_s);

    let _ = tokio::join!(t1, t2, t3, discovery);
    Ok(())
}

fn spawn_tier_loop(poller: Arc<TieredPoller>, tier: u8, interval_s: f64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs_f64(interval_s.max(1.0)));
        loop {
            ticker.tick().await;
            let result = match tier {
                1 => poller.run_tier1_poll().await,
                2 => poller.run_tier2_poll().await,
                _ => poller.run_tier3_poll().await,
            };
            match result {
                Ok(stats) if stats.wallets_polled > 0 => {
                    info!(tier, wallets = stats.wallets_polled, liquidations = stats.liquidations_detected, "tier poll cycle done");
                }
                Ok(_) => {}
                Err(e) => error!(tier, error = %e, "tier poll cycle failed"),
            }
        }
    })
}

fn spawn_discovery_loop(poller: Arc<TieredPoller>, interval_s: f64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs_f64(interval_s.max(1.0)));
        loop {
            ticker.tick().await;
            match poller.run_discovery().await {
                Ok(found) if found > 0 => info!(found, "discovery run complete"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "discovery run failed"),
            }
        }
    })
}
