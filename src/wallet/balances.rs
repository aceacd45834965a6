//! Balance aggregation and change-detected persistence.
//!
//! Balances are a per-run snapshot derived from the UTXO set; they are
//! recomputed whole and persisted only when structurally different from the
//! previously stored snapshot, so downstream change notifications never fire
//! spuriously.

use crate::remote::Attachment;
use crate::store::{self, PersistentStore, StoreError, keys};
use crate::wallet::types::{AssetBalance, Balance, MitEntry};
use crate::wallet::utxo::Utxo;
use std::collections::BTreeMap;
use tracing::debug;

/// Aggregate a UTXO set into per-asset balances at the given height.
///
/// ETP value splits into frozen/available by whether the output's height lock
/// reaches past `current_height`; asset quantities split by the attenuation
/// lock; MIT outputs are listed individually.
pub fn recompute(utxos: &[Utxo], current_height: u64) -> Balance {
    let mut balance = Balance::default();

    for utxo in utxos {
        match &utxo.attachment {
            Attachment::EtpTransfer => {
                if utxo.locked_until() > current_height {
                    balance.etp.frozen += utxo.value;
                } else {
                    balance.etp.available += utxo.value;
                }
            }
            Attachment::AssetIssue {
                symbol,
                quantity,
                decimals,
                ..
            }
            | Attachment::AssetTransfer {
                symbol,
                quantity,
                decimals,
            } => {
                let entry = balance
                    .mst
                    .entry(symbol.clone())
                    .or_insert_with(|| AssetBalance::with_decimals(*decimals));
                entry.decimals = *decimals;
                if utxo.is_spendable_at(current_height) {
                    entry.available += quantity;
                } else {
                    entry.frozen += quantity;
                }
            }
            Attachment::AssetCert { .. } => {
                // Certificates are permission tokens, not value.
            }
            Attachment::Mit { symbol, content } => {
                balance.mit.push(MitEntry {
                    symbol: symbol.clone(),
                    address: utxo.address.clone(),
                    content: content.clone(),
                });
            }
        }
    }

    balance
}

/// Per-address balances, used for the `addressBalances` snapshot.
pub fn recompute_by_address(utxos: &[Utxo], current_height: u64) -> BTreeMap<String, Balance> {
    let mut grouped: BTreeMap<String, Vec<Utxo>> = BTreeMap::new();
    for utxo in utxos {
        grouped
            .entry(utxo.address.clone())
            .or_default()
            .push(utxo.clone());
    }
    grouped
        .into_iter()
        .map(|(address, utxos)| (address, recompute(&utxos, current_height)))
        .collect()
}

/// Read the persisted balance snapshot, default-empty when absent.
pub async fn load(store: &dyn PersistentStore) -> Result<Balance, StoreError> {
    Ok(store::get_json(store, keys::BALANCES)
        .await?
        .unwrap_or_default())
}

/// Persist the snapshot iff it differs structurally from the stored one.
/// Returns whether a write happened, which drives the balances-changed event.
pub async fn persist_if_changed(
    store: &dyn PersistentStore,
    balance: &Balance,
) -> Result<bool, StoreError> {
    let new_value = serde_json::to_value(balance)?;
    let stored = store.get(keys::BALANCES).await?;
    if stored.as_ref() == Some(&new_value) {
        debug!("Balances unchanged, skipping write");
        return Ok(false);
    }
    store.set(keys::BALANCES, new_value).await?;
    Ok(true)
}

/// Persist per-address balances.
pub async fn persist_address_balances(
    store: &dyn PersistentStore,
    balances: &BTreeMap<String, Balance>,
) -> Result<(), StoreError> {
    store::set_json(store, keys::ADDRESS_BALANCES, balances).await
}

/// The asset display order: insertion order of first sight, append-only.
pub async fn asset_order(store: &dyn PersistentStore) -> Result<Vec<String>, StoreError> {
    Ok(store::get_json(store, keys::ASSET_ORDER)
        .await?
        .unwrap_or_default())
}

/// Append unseen symbols to the asset order. Existing entries are never
/// reordered or removed.
pub async fn add_assets_to_order<I, S>(
    store: &dyn PersistentStore,
    symbols: I,
) -> Result<Vec<String>, StoreError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut order = asset_order(store).await?;
    let mut changed = false;
    for symbol in symbols {
        let symbol = symbol.as_ref();
        if !order.iter().any(|existing| existing == symbol) {
            order.push(symbol.to_string());
            changed = true;
        }
    }
    if changed {
        store::set_json(store, keys::ASSET_ORDER, &order).await?;
    }
    Ok(order)
}
