//! Spendable-output derivation.
//!
//! UTXOs are never stored: they are a pure function of a ledger snapshot and
//! an address set, recomputed at event-driven cadence. Incremental patching is
//! deliberately avoided so the derived view cannot diverge from the log.

use crate::remote::{Attachment, AttenuationParams, CertKind, OutPoint, TransactionRecord};
use std::collections::HashSet;

/// An unspent output, carrying its provenance (transaction hash, output index
/// and confirmation height) alongside the output fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Utxo {
    pub hash: String,
    pub index: u32,
    /// Confirmation height of the creating transaction, 0 if unconfirmed.
    pub height: u64,
    pub address: String,
    pub value: u64,
    pub attachment: Attachment,
    pub locked_height_range: u64,
    pub attenuation: Option<AttenuationParams>,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            hash: self.hash.clone(),
            index: self.index,
        }
    }

    /// Height until which the ETP lock holds, 0 when unlocked.
    pub fn locked_until(&self) -> u64 {
        if self.height > 0 && self.locked_height_range > 0 {
            self.height + self.locked_height_range
        } else {
            0
        }
    }

    /// Whether the output can be consumed as an input at the given height.
    /// Both the ETP height lock and the attenuation lock are respected;
    /// unconfirmed outputs are spendable.
    pub fn is_spendable_at(&self, current_height: u64) -> bool {
        if self.locked_until() > current_height {
            return false;
        }
        if let Some(attenuation) = &self.attenuation {
            if self.height > 0
                && attenuation.lock_period > 0
                && self.height + attenuation.lock_period > current_height
            {
                return false;
            }
        }
        true
    }
}

/// Derive the current UTXO set from a ledger snapshot and an address set.
///
/// An output qualifies iff it belongs to a tracked address and no transaction
/// in the snapshot references it as an input. The result does not depend on
/// transaction iteration order; it is sorted by (hash, index).
pub fn compute_utxo(transactions: &[TransactionRecord], addresses: &HashSet<String>) -> Vec<Utxo> {
    let spent: HashSet<(&str, u32)> = transactions
        .iter()
        .flat_map(|tx| tx.inputs.iter())
        .map(|input| {
            (
                input.previous_output.hash.as_str(),
                input.previous_output.index,
            )
        })
        .collect();

    let mut utxos: Vec<Utxo> = transactions
        .iter()
        .flat_map(|tx| {
            tx.outputs.iter().enumerate().filter_map(|(index, output)| {
                let index = index as u32;
                if !addresses.contains(&output.address) {
                    return None;
                }
                if spent.contains(&(tx.hash.as_str(), index)) {
                    return None;
                }
                Some(Utxo {
                    hash: tx.hash.clone(),
                    index,
                    height: tx.height,
                    address: output.address.clone(),
                    value: output.value,
                    attachment: output.attachment.clone(),
                    locked_height_range: output.locked_height_range,
                    attenuation: output.attenuation.clone(),
                })
            })
        })
        .collect();

    utxos.sort_by(|a, b| a.hash.cmp(&b.hash).then(a.index.cmp(&b.index)));
    utxos
}

/// Restrict a pool to a single owning address; `None` leaves it unfiltered.
pub fn filter_by_address(utxos: Vec<Utxo>, address: Option<&str>) -> Vec<Utxo> {
    match address {
        Some(address) => utxos
            .into_iter()
            .filter(|utxo| utxo.address == address)
            .collect(),
        None => utxos,
    }
}

/// MIT-typed outputs carrying the given symbol.
pub fn filter_mit<'a>(utxos: &'a [Utxo], symbol: &str) -> Vec<&'a Utxo> {
    utxos
        .iter()
        .filter(|utxo| matches!(&utxo.attachment, Attachment::Mit { symbol: s, .. } if s == symbol))
        .collect()
}

/// All certificate outputs in the pool.
pub fn list_certs(utxos: &[Utxo]) -> Vec<&Utxo> {
    utxos
        .iter()
        .filter(|utxo| matches!(utxo.attachment, Attachment::AssetCert { .. }))
        .collect()
}

/// Certificate outputs of one kind for an exact symbol.
pub fn certs_for<'a>(utxos: &'a [Utxo], symbol: &str, kind: CertKind) -> Vec<&'a Utxo> {
    utxos
        .iter()
        .filter(|utxo| {
            matches!(
                &utxo.attachment,
                Attachment::AssetCert { symbol: s, cert } if s == symbol && *cert == kind
            )
        })
        .collect()
}

/// Outputs of the given asset still under a lock at the current height.
/// `"ETP"` selects height-locked ETP outputs, any other symbol selects
/// attenuation-locked asset outputs.
pub fn frozen_outputs<'a>(utxos: &'a [Utxo], asset: &str, current_height: u64) -> Vec<&'a Utxo> {
    utxos
        .iter()
        .filter(|utxo| !utxo.is_spendable_at(current_height))
        .filter(|utxo| match (&utxo.attachment, asset) {
            (Attachment::EtpTransfer, crate::transaction::ETP_SYMBOL) => true,
            (attachment, asset) => attachment.symbol() == Some(asset),
        })
        .collect()
}
