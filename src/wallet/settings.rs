//! Wallet settings, address management and reset flows.
//!
//! The store schema carries a version stamp. When the required version moves
//! ahead of the stored one the wallet must be hard reset before use; the hard
//! reset wipes everything except the user's cosmetic preferences and their
//! saved account list.

use crate::remote::RemoteLedgerSource;
use crate::store::{self, PersistentStore, StoreError, keys};
use crate::wallet::sync::events::{EventDispatcher, WalletEvent};
use crate::wallet::types::WalletError;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

/// Keys that survive a hard reset.
const PRESERVED_KEYS: [&str; 3] = [keys::THEME, keys::LANGUAGE, keys::SAVED_ACCOUNTS];

/// Stored schema version, if any.
pub async fn db_version(store: &dyn PersistentStore) -> Result<Option<String>, StoreError> {
    store::get_json(store, keys::DB_VERSION).await
}

pub async fn set_db_version(
    store: &dyn PersistentStore,
    version: &str,
) -> Result<(), StoreError> {
    store::set_json(store, keys::DB_VERSION, &version).await
}

/// Whether the stored schema is behind `required` and a hard reset is due.
/// A missing stamp counts as outdated.
pub async fn db_update_needed(
    store: &dyn PersistentStore,
    required: &str,
) -> Result<bool, StoreError> {
    let stored = db_version(store).await?;
    Ok(stored.as_deref() != Some(required))
}

/// Wipe the store, keeping only theme, language and saved accounts, then
/// stamp the new schema version.
pub async fn hard_reset(
    store: &dyn PersistentStore,
    dispatcher: &mut EventDispatcher,
    new_version: &str,
) -> Result<(), WalletError> {
    let mut preserved: Vec<(&str, Value)> = Vec::new();
    for key in PRESERVED_KEYS {
        if let Some(value) = store.get(key).await? {
            preserved.push((key, value));
        }
    }

    warn!("Hard reset: clearing wallet store, keeping {} preference keys", preserved.len());
    store.clear().await?;
    for (key, value) in preserved {
        store.set(key, value).await?;
    }
    set_db_version(store, new_version).await?;

    dispatcher.dispatch(&WalletEvent::SettingsUpdated).await;
    Ok(())
}

/// Drop derived sync state so the next pass rebuilds it from scratch.
/// Addresses and preferences stay.
pub async fn data_reset(store: &dyn PersistentStore) -> Result<(), StoreError> {
    for key in [
        keys::LAST_TX_HEIGHT,
        keys::HEIGHT,
        keys::BALANCES,
        keys::ADDRESS_BALANCES,
        keys::TRANSACTIONS,
        keys::ASSET_ORDER,
    ] {
        store.remove(key).await?;
    }
    info!("Derived sync state cleared");
    Ok(())
}

/// Fiat currency used for quote display, defaulting to USD.
pub async fn base_currency(store: &dyn PersistentStore) -> Result<String, StoreError> {
    Ok(store::get_json(store, keys::BASE_CURRENCY)
        .await?
        .unwrap_or_else(|| "USD".to_string()))
}

pub async fn set_base_currency(
    store: &dyn PersistentStore,
    dispatcher: &mut EventDispatcher,
    currency: &str,
) -> Result<(), StoreError> {
    store::set_json(store, keys::BASE_CURRENCY, &currency).await?;
    dispatcher.dispatch(&WalletEvent::SettingsUpdated).await;
    Ok(())
}

/// Per-symbol quotes in the configured base currency. Symbols without a quote
/// for that currency are omitted.
pub async fn quotes_in_base_currency(
    store: &dyn PersistentStore,
    remote: &dyn RemoteLedgerSource,
) -> Result<HashMap<String, f64>, WalletError> {
    let currency = base_currency(store).await?;
    let tickers = remote.price_tickers().await?;
    Ok(tickers
        .into_iter()
        .filter_map(|(symbol, quotes)| quotes.get(&currency).map(|price| (symbol, *price)))
        .collect())
}

pub async fn addresses(store: &dyn PersistentStore) -> Result<Vec<String>, StoreError> {
    Ok(store::get_json(store, keys::ADDRESSES)
        .await?
        .unwrap_or_default())
}

pub async fn set_addresses(
    store: &dyn PersistentStore,
    dispatcher: &mut EventDispatcher,
    addresses: &[String],
) -> Result<(), StoreError> {
    store::set_json(store, keys::ADDRESSES, &addresses).await?;
    dispatcher.dispatch(&WalletEvent::SettingsUpdated).await;
    Ok(())
}

/// Append addresses not yet tracked, keeping existing order.
pub async fn add_addresses(
    store: &dyn PersistentStore,
    dispatcher: &mut EventDispatcher,
    new_addresses: &[String],
) -> Result<(), StoreError> {
    let mut current = addresses(store).await?;
    let mut changed = false;
    for address in new_addresses {
        if !current.contains(address) {
            current.push(address.clone());
            changed = true;
        }
    }
    if changed {
        set_addresses(store, dispatcher, &current).await?;
    }
    Ok(())
}

pub async fn multisig_addresses(store: &dyn PersistentStore) -> Result<Vec<String>, StoreError> {
    Ok(store::get_json(store, keys::MULTISIG_ADDRESSES)
        .await?
        .unwrap_or_default())
}

pub async fn set_multisig_addresses(
    store: &dyn PersistentStore,
    dispatcher: &mut EventDispatcher,
    addresses: &[String],
) -> Result<(), StoreError> {
    store::set_json(store, keys::MULTISIG_ADDRESSES, &addresses).await?;
    dispatcher.dispatch(&WalletEvent::SettingsUpdated).await;
    Ok(())
}

/// Persist an account snapshot into the saved-accounts list, replacing any
/// entry with the same name. Failures surface as `ERR_SAVE_ACCOUNT`.
pub async fn save_account(
    store: &dyn PersistentStore,
    name: &str,
    account: Value,
) -> Result<(), WalletError> {
    let mut accounts: Vec<Value> = store::get_json(store, keys::SAVED_ACCOUNTS)
        .await
        .map_err(|_| WalletError::SaveAccount)?
        .unwrap_or_default();

    accounts.retain(|entry| entry.get("name").and_then(Value::as_str) != Some(name));
    let mut entry = serde_json::Map::new();
    entry.insert("name".to_string(), Value::String(name.to_string()));
    entry.insert("account".to_string(), account);
    accounts.push(Value::Object(entry));

    store::set_json(store, keys::SAVED_ACCOUNTS, &accounts)
        .await
        .map_err(|_| WalletError::SaveAccount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn hard_reset_preserves_preferences_only() {
        let store = MemoryStore::new();
        let mut dispatcher = EventDispatcher::new();

        store.set(keys::THEME, json!("dark")).await.unwrap();
        store.set(keys::LANGUAGE, json!("de")).await.unwrap();
        store
            .set(keys::SAVED_ACCOUNTS, json!([{"name": "main"}]))
            .await
            .unwrap();
        store.set(keys::BALANCES, json!({"ETP": 5})).await.unwrap();
        store.set(keys::HEIGHT, json!(12345)).await.unwrap();

        hard_reset(&store, &mut dispatcher, "0.2").await.unwrap();

        assert_eq!(store.get(keys::THEME).await.unwrap(), Some(json!("dark")));
        assert_eq!(store.get(keys::LANGUAGE).await.unwrap(), Some(json!("de")));
        assert_eq!(
            store.get(keys::SAVED_ACCOUNTS).await.unwrap(),
            Some(json!([{"name": "main"}]))
        );
        assert_eq!(store.get(keys::BALANCES).await.unwrap(), None);
        assert_eq!(store.get(keys::HEIGHT).await.unwrap(), None);
        assert_eq!(db_version(&store).await.unwrap().as_deref(), Some("0.2"));
    }

    #[tokio::test]
    async fn version_gate_fires_on_mismatch_and_absence() {
        let store = MemoryStore::new();
        assert!(db_update_needed(&store, "0.2").await.unwrap());

        set_db_version(&store, "0.1").await.unwrap();
        assert!(db_update_needed(&store, "0.2").await.unwrap());

        set_db_version(&store, "0.2").await.unwrap();
        assert!(!db_update_needed(&store, "0.2").await.unwrap());
    }

    #[tokio::test]
    async fn data_reset_keeps_addresses() {
        let store = MemoryStore::new();
        store.set(keys::ADDRESSES, json!(["addr1"])).await.unwrap();
        store.set(keys::BALANCES, json!({"ETP": 5})).await.unwrap();
        store.set(keys::TRANSACTIONS, json!([])).await.unwrap();

        data_reset(&store).await.unwrap();
        assert_eq!(
            store.get(keys::ADDRESSES).await.unwrap(),
            Some(json!(["addr1"]))
        );
        assert_eq!(store.get(keys::BALANCES).await.unwrap(), None);
        assert_eq!(store.get(keys::TRANSACTIONS).await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_addresses_deduplicates() {
        let store = MemoryStore::new();
        let mut dispatcher = EventDispatcher::new();

        add_addresses(&store, &mut dispatcher, &["a".into(), "b".into()])
            .await
            .unwrap();
        add_addresses(&store, &mut dispatcher, &["b".into(), "c".into()])
            .await
            .unwrap();

        assert_eq!(addresses(&store).await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn save_account_replaces_by_name() {
        let store = MemoryStore::new();
        save_account(&store, "main", json!({"v": 1})).await.unwrap();
        save_account(&store, "main", json!({"v": 2})).await.unwrap();

        let accounts: Vec<Value> = store::get_json(&store, keys::SAVED_ACCOUNTS)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0]["account"]["v"], json!(2));
    }

    #[tokio::test]
    async fn quotes_follow_the_configured_currency() {
        use crate::remote::{
            BroadcastResponse, RemoteError, TickerQuotes, TransactionRecord,
        };
        use async_trait::async_trait;
        use std::collections::HashMap;

        struct QuoteRemote;

        #[async_trait]
        impl crate::remote::RemoteLedgerSource for QuoteRemote {
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
                Ok(HashMap::from([(
                    "ETP".to_string(),
                    HashMap::from([("USD".to_string(), 0.5), ("EUR".to_string(), 0.4)]),
                )]))
            }
            async fn bridge_whitelist(&self) -> Result<Vec<String>, RemoteError> {
                Ok(Vec::new())
            }
            async fn block_time(&self, _downscale: u32) -> Result<f64, RemoteError> {
                Ok(24.0)
            }
            async fn broadcast(&self, _raw_tx: &str) -> Result<BroadcastResponse, RemoteError> {
                Err(RemoteError::NoData)
            }
        }

        let store = MemoryStore::new();
        let quotes = quotes_in_base_currency(&store, &QuoteRemote).await.unwrap();
        assert_eq!(quotes["ETP"], 0.5);

        let mut dispatcher = EventDispatcher::new();
        set_base_currency(&store, &mut dispatcher, "EUR")
            .await
            .unwrap();
        let quotes = quotes_in_base_currency(&store, &QuoteRemote).await.unwrap();
        assert_eq!(quotes["ETP"], 0.4);
    }

    #[tokio::test]
    async fn base_currency_defaults_to_usd() {
        let store = MemoryStore::new();
        assert_eq!(base_currency(&store).await.unwrap(), "USD");

        let mut dispatcher = EventDispatcher::new();
        set_base_currency(&store, &mut dispatcher, "EUR")
            .await
            .unwrap();
        assert_eq!(base_currency(&store).await.unwrap(), "EUR");
    }
}
