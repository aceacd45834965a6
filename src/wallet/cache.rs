//! Staleness-gated caching for slow remote lookups.
//!
//! A cache entry pairs a value with a staleness marker, either a wall-clock
//! timestamp or a block height. On a stale (or missing) entry the fresh value
//! is fetched, persisted with its marker, and returned; otherwise the cached
//! value is served unchanged.

use crate::remote::RemoteLedgerSource;
use crate::store::{self, PersistentStore, keys};
use crate::wallet::types::WalletError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Whitelist entries older than this are refetched.
pub const WHITELIST_TTL_SECS: i64 = 3600;
/// Blocktime estimates older than this many blocks are refetched.
pub const BLOCKTIME_HEIGHT_DELTA: u64 = 1000;
/// Sampling granularity for the blocktime estimate.
pub const BLOCKTIME_DOWNSCALE: u32 = 10;

/// A persisted cache entry: a value plus the marker that gates staleness.
pub trait CacheEntry: Serialize + DeserializeOwned {
    type Value;

    fn into_value(self) -> Self::Value;
}

/// Serve the cached value under `key` unless `is_stale` says otherwise, in
/// which case fetch a fresh entry, persist it, and serve that.
pub async fn get_or_refresh<E, Fut>(
    store: &dyn PersistentStore,
    key: &str,
    is_stale: impl FnOnce(&E) -> bool,
    fetch: impl FnOnce() -> Fut,
) -> Result<E::Value, WalletError>
where
    E: CacheEntry,
    Fut: Future<Output = Result<E, WalletError>>,
{
    if let Some(cached) = store::get_json::<E>(store, key).await? {
        if !is_stale(&cached) {
            return Ok(cached.into_value());
        }
        debug!("Cache entry {} is stale, refreshing", key);
    }

    let fresh = fetch().await?;
    store::set_json(store, key, &fresh).await?;
    Ok(fresh.into_value())
}

#[derive(Debug, Serialize, Deserialize)]
struct WhitelistCache {
    whitelist: Vec<String>,
    #[serde(rename = "lastUpdate")]
    last_update: DateTime<Utc>,
}

impl CacheEntry for WhitelistCache {
    type Value = Vec<String>;

    fn into_value(self) -> Vec<String> {
        self.whitelist
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BlocktimeCache {
    time: f64,
    height: u64,
}

impl CacheEntry for BlocktimeCache {
    type Value = f64;

    fn into_value(self) -> f64 {
        self.time
    }
}

/// Bridge whitelist, cached for one hour of wall-clock time.
/// Any failure surfaces as `ERR_GET_WHITELIST`.
pub async fn whitelist(
    store: &dyn PersistentStore,
    remote: &dyn RemoteLedgerSource,
) -> Result<Vec<String>, WalletError> {
    whitelist_at(store, remote, Utc::now()).await
}

/// Staleness evaluated against an explicit `now`, for deterministic tests.
pub async fn whitelist_at(
    store: &dyn PersistentStore,
    remote: &dyn RemoteLedgerSource,
    now: DateTime<Utc>,
) -> Result<Vec<String>, WalletError> {
    get_or_refresh(
        store,
        keys::WHITELIST_CACHE,
        |cached: &WhitelistCache| now - cached.last_update > TimeDelta::seconds(WHITELIST_TTL_SECS),
        || async {
            let whitelist = remote.bridge_whitelist().await?;
            Ok(WhitelistCache {
                whitelist,
                last_update: now,
            })
        },
    )
    .await
    .map_err(|error| match error {
        WalletError::Store(e) => WalletError::Store(e),
        _ => WalletError::WhitelistUnavailable,
    })
}

/// Average block time, cached until the chain advances 1000 blocks past the
/// height at which it was sampled. Any failure surfaces as `ERR_GET_BLOCKTIME`.
pub async fn blocktime(
    store: &dyn PersistentStore,
    remote: &dyn RemoteLedgerSource,
    current_height: u64,
) -> Result<f64, WalletError> {
    get_or_refresh(
        store,
        keys::BLOCKTIME_CACHE,
        |cached: &BlocktimeCache| current_height > cached.height + BLOCKTIME_HEIGHT_DELTA,
        || async {
            let time = remote.block_time(BLOCKTIME_DOWNSCALE).await?;
            Ok(BlocktimeCache {
                time,
                height: current_height,
            })
        },
    )
    .await
    .map_err(|error| match error {
        WalletError::Store(e) => WalletError::Store(e),
        _ => WalletError::BlocktimeUnavailable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{BroadcastResponse, RemoteError, TickerQuotes, TransactionRecord};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Remote stub that counts fetches and can be told to fail.
    #[derive(Default)]
    struct StubRemote {
        whitelist_fetches: AtomicUsize,
        blocktime_fetches: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RemoteLedgerSource for StubRemote {
        async fn height(&self) -> Result<u64, RemoteError> {
            Ok(0)
        }

        async fn list_transactions(
            &self,
            _addresses: &[String],
            _min_height: u64,
        ) -> Result<Vec<TransactionRecord>, RemoteError> {
            Ok(Vec::new())
        }

        async fn price_tickers(&self) -> Result<HashMap<String, TickerQuotes>, RemoteError> {
            Ok(HashMap::new())
        }

        async fn bridge_whitelist(&self) -> Result<Vec<String>, RemoteError> {
            if self.fail {
                return Err(RemoteError::NoData);
            }
            self.whitelist_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["0xabc".to_string()])
        }

        async fn block_time(&self, _downscale: u32) -> Result<f64, RemoteError> {
            if self.fail {
                return Err(RemoteError::NoData);
            }
            self.blocktime_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(42.5)
        }

        async fn broadcast(&self, _raw_tx: &str) -> Result<BroadcastResponse, RemoteError> {
            Err(RemoteError::NoData)
        }
    }

    #[tokio::test]
    async fn whitelist_served_from_cache_within_ttl() {
        let store = MemoryStore::new();
        let remote = StubRemote::default();
        let t0 = Utc::now();

        whitelist_at(&store, &remote, t0).await.unwrap();
        // 3599 seconds later: still fresh.
        whitelist_at(&store, &remote, t0 + TimeDelta::seconds(3599))
            .await
            .unwrap();
        assert_eq!(remote.whitelist_fetches.load(Ordering::SeqCst), 1);

        // 3601 seconds later: refetched.
        whitelist_at(&store, &remote, t0 + TimeDelta::seconds(3601))
            .await
            .unwrap();
        assert_eq!(remote.whitelist_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blocktime_refreshes_after_height_delta() {
        let store = MemoryStore::new();
        let remote = StubRemote::default();

        assert_eq!(blocktime(&store, &remote, 5000).await.unwrap(), 42.5);
        // Served from cache up to 1000 blocks past the sample height.
        blocktime(&store, &remote, 6000).await.unwrap();
        assert_eq!(remote.blocktime_fetches.load(Ordering::SeqCst), 1);

        blocktime(&store, &remote, 6001).await.unwrap();
        assert_eq!(remote.blocktime_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_surface_stable_codes() {
        let store = MemoryStore::new();
        let remote = StubRemote {
            fail: true,
            ..Default::default()
        };

        let err = whitelist_at(&store, &remote, Utc::now()).await.unwrap_err();
        assert_eq!(err.to_string(), "ERR_GET_WHITELIST");

        let err = blocktime(&store, &remote, 100).await.unwrap_err();
        assert_eq!(err.to_string(), "ERR_GET_BLOCKTIME");
    }
}
