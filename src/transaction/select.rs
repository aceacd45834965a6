//! UTXO selection.
//!
//! Greedy first-fit over the pool: outputs are taken while any requested
//! target (including the fee, accounted under the base currency) is unmet.
//! Certificate and MIT outputs are never picked up implicitly; locked and
//! attenuated outputs are skipped entirely.

use crate::transaction::{ETP_SYMBOL, MAX_TX_INPUTS};
use crate::wallet::types::WalletError;
use crate::wallet::utxo::Utxo;
use std::collections::BTreeMap;

/// Outcome of a selection round: the chosen inputs and the per-asset change
/// owed back to the wallet.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub utxos: Vec<Utxo>,
    /// Surplus per symbol, fee already deducted from the base-currency entry.
    pub change: BTreeMap<String, u64>,
}

/// Select outputs from `pool` covering `targets` plus `fee`.
///
/// Targets are keyed by symbol; the base currency is `"ETP"`. Fails with
/// `ERR_INSUFFICIENT_BALANCE` when the pool cannot cover the request and with
/// `ERR_TOO_MANY_INPUTS` when covering it would exceed the input ceiling.
pub fn find_utxo(
    pool: &[Utxo],
    targets: &BTreeMap<String, u64>,
    current_height: u64,
    fee: u64,
) -> Result<Selection, WalletError> {
    let mut required = targets.clone();
    if fee > 0 {
        *required.entry(ETP_SYMBOL.to_string()).or_insert(0) += fee;
    }

    let mut gathered: BTreeMap<String, u64> = BTreeMap::new();
    let mut selected: Vec<Utxo> = Vec::new();

    let unmet = |required: &BTreeMap<String, u64>, gathered: &BTreeMap<String, u64>, symbol: &str| {
        required
            .get(symbol)
            .is_some_and(|needed| gathered.get(symbol).copied().unwrap_or(0) < *needed)
    };

    for utxo in pool {
        if required
            .iter()
            .all(|(symbol, needed)| gathered.get(symbol).copied().unwrap_or(0) >= *needed)
        {
            break;
        }
        if !utxo.is_spendable_at(current_height) {
            continue;
        }

        let contributes = match utxo.attachment.symbol() {
            // Plain ETP output.
            None if utxo.value > 0 => unmet(&required, &gathered, ETP_SYMBOL),
            None => false,
            Some(symbol) => {
                if !utxo.attachment.is_countable() {
                    // Certs and MITs move only when asked for explicitly.
                    false
                } else {
                    unmet(&required, &gathered, symbol)
                        || (utxo.value > 0 && unmet(&required, &gathered, ETP_SYMBOL))
                }
            }
        };
        if !contributes {
            continue;
        }

        if utxo.value > 0 {
            *gathered.entry(ETP_SYMBOL.to_string()).or_insert(0) += utxo.value;
        }
        if let (Some(symbol), Some(quantity)) =
            (utxo.attachment.symbol(), utxo.attachment.quantity())
        {
            *gathered.entry(symbol.to_string()).or_insert(0) += quantity;
        }
        selected.push(utxo.clone());
        if selected.len() > MAX_TX_INPUTS {
            return Err(WalletError::TooManyInputs);
        }
    }

    for (symbol, needed) in &required {
        if gathered.get(symbol).copied().unwrap_or(0) < *needed {
            return Err(WalletError::InsufficientBalance);
        }
    }

    let change = gathered
        .into_iter()
        .filter_map(|(symbol, amount)| {
            let surplus = amount - required.get(&symbol).copied().unwrap_or(0);
            (surplus > 0).then_some((symbol, surplus))
        })
        .collect();

    Ok(Selection {
        utxos: selected,
        change,
    })
}
