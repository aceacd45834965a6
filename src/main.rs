//! Command-line sync runner.
//!
//! Configured through the environment:
//! - `MVS_API_URL`: explorer API base URL
//! - `MVS_DATA_DIR`: directory for the file-backed store
//! - `MVS_ADDRESSES`: comma-separated wallet addresses to track
//! - `MVS_UPDATE_INTERVAL_SECS`: staleness threshold between syncs
//! - `MVS_WATCH`: keep syncing periodically instead of exiting after one pass

use mvs_wallet_sync::store::{self, FileStore, keys};
use mvs_wallet_sync::wallet::sync::{SyncConfig, SyncEngine};
use mvs_wallet_sync::wallet::{balances, settings};
use mvs_wallet_sync::{HttpLedgerSource, PersistentStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DB_VERSION: &str = "0.1";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let api_url =
        std::env::var("MVS_API_URL").unwrap_or_else(|_| "https://explorer.mvs.org/api".to_string());
    let data_dir = std::env::var("MVS_DATA_DIR").unwrap_or_else(|_| "wallet-data".to_string());

    let store: Arc<dyn PersistentStore> = Arc::new(FileStore::new(PathBuf::from(data_dir)).await?);

    let mut config = SyncConfig::default();
    if let Some(secs) = std::env::var("MVS_UPDATE_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.update_interval = std::time::Duration::from_secs(secs);
    }

    let remote = Arc::new(HttpLedgerSource::new(api_url));
    let engine = SyncEngine::new(store.clone(), remote, config).await?;

    if settings::db_update_needed(store.as_ref(), DB_VERSION).await? {
        engine.hard_reset(DB_VERSION).await?;
    }

    if let Ok(addresses) = std::env::var("MVS_ADDRESSES") {
        let addresses: Vec<String> = addresses
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
        store::set_json(store.as_ref(), keys::ADDRESSES, &addresses).await?;
    }

    engine.sync().await?;

    let status = engine.status();
    info!(
        "Synced to height {} (offline: {})",
        status.last_height, status.offline
    );

    let balance = balances::load(store.as_ref()).await?;
    println!("ETP available: {}", balance.etp.available);
    println!("ETP frozen:    {}", balance.etp.frozen);
    for (symbol, asset) in &balance.mst {
        println!("{}: {} available, {} frozen", symbol, asset.available, asset.frozen);
    }
    for mit in &balance.mit {
        println!("MIT {} held by {}", mit.symbol, mit.address);
    }

    if std::env::var("MVS_WATCH").is_ok() {
        engine.run().await;
    }

    Ok(())
}
