//! Key-value persistence for wallet state.
//!
//! Everything the engine persists goes through the `PersistentStore` contract:
//! string keys, JSON values, async get/set/remove/clear. Two implementations
//! are provided, an in-memory store for tests and short-lived tools, and a
//! file-backed store that keeps one JSON document per key in a data directory.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// Persisted key names. The shapes stored under these keys are load-bearing
/// for compatibility across versions, so they live in one place.
pub mod keys {
    pub const ADDRESSES: &str = "addresses";
    pub const MULTISIG_ADDRESSES: &str = "multisigAddresses";
    pub const TRANSACTIONS: &str = "transactions";
    pub const HEIGHT: &str = "height";
    pub const LAST_TX_HEIGHT: &str = "lastTxHeight";
    pub const BALANCES: &str = "balances";
    pub const ADDRESS_BALANCES: &str = "addressBalances";
    pub const ASSET_ORDER: &str = "assetOrder";
    pub const DB_VERSION: &str = "dbVersion";
    pub const WHITELIST_CACHE: &str = "whitelistCache";
    pub const BLOCKTIME_CACHE: &str = "blocktimeCache";
    pub const BASE_CURRENCY: &str = "baseCurrency";
    pub const THEME: &str = "theme";
    pub const LANGUAGE: &str = "language";
    pub const SAVED_ACCOUNTS: &str = "savedAccounts";
}

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Async key-value store contract used by every component that persists state.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Read a typed value from the store, `None` if the key is absent.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn PersistentStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Write a typed value to the store.
pub async fn set_json<T: Serialize>(
    store: &dyn PersistentStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.set(key, serde_json::to_value(value)?).await
}

/// In-memory store. State lives for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

/// File-backed store keeping one pretty-printed JSON document per key.
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at the given data directory, creating it if needed.
    pub async fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&data_dir).await?;
        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let path = self.path_for(key);
        tokio::fs::write(&path, serde_json::to_string_pretty(&value)?).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                tokio::fs::remove_file(&path).await?;
            }
        }
        info!("Cleared store at {:?}", self.data_dir);
        Ok(())
    }
}
