//! Local transaction ledger.
//!
//! The ledger is an append/overwrite store of transaction records keyed by
//! hash, plus a synchronization cursor. Re-ingesting a known hash replaces the
//! record in place; it never creates a duplicate entry. The cursor is the
//! maximum height across the entire ledger, recomputed on every merge rather
//! than derived from the most recently merged batch, so it cannot regress or
//! stall when batches arrive out of global order.

use crate::remote::{Attachment, OutPoint, TransactionRecord};
use crate::store::{self, PersistentStore, StoreError, keys};
use crate::wallet::types::WalletError;
use std::collections::HashMap;
use tracing::{debug, info};

/// A transaction input enriched with the previous output it spends.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub previous_output: OutPoint,
    pub address: String,
    pub value: u64,
    pub attachment: Attachment,
}

/// Append/overwrite store of transaction records with a height cursor.
#[derive(Debug, Default)]
pub struct Ledger {
    records: HashMap<String, TransactionRecord>,
    cursor: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from previously persisted records.
    pub fn from_records(records: Vec<TransactionRecord>) -> Self {
        let mut ledger = Self::new();
        ledger.merge(records);
        ledger
    }

    /// Load the ledger from the store, empty if nothing was persisted yet.
    pub async fn load(store: &dyn PersistentStore) -> Result<Self, StoreError> {
        let records: Vec<TransactionRecord> = store::get_json(store, keys::TRANSACTIONS)
            .await?
            .unwrap_or_default();
        debug!("Loaded {} transactions from store", records.len());
        Ok(Self::from_records(records))
    }

    /// Persist the current records under the `transactions` key.
    pub async fn save(&self, store: &dyn PersistentStore) -> Result<(), StoreError> {
        store::set_json(store, keys::TRANSACTIONS, &self.all()).await
    }

    /// Merge a batch of records: unknown hashes are inserted, known hashes are
    /// overwritten in place. Returns the updated cursor, recomputed as the
    /// maximum height over the whole ledger.
    pub fn merge(&mut self, batch: Vec<TransactionRecord>) -> u64 {
        let batch_len = batch.len();
        for record in batch {
            self.records.insert(record.hash.clone(), record);
        }
        self.cursor = self
            .records
            .values()
            .map(|record| record.height)
            .max()
            .unwrap_or(0);
        if batch_len > 0 {
            info!(
                "Merged {} transactions, ledger at {} records, cursor {}",
                batch_len,
                self.records.len(),
                self.cursor
            );
        }
        self.cursor
    }

    /// Highest height among all transactions ever ingested.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Snapshot of all records, ordered by descending height then hash so
    /// reads are deterministic.
    pub fn all(&self) -> Vec<TransactionRecord> {
        let mut records: Vec<TransactionRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| b.height.cmp(&a.height).then_with(|| a.hash.cmp(&b.hash)));
        records
    }

    pub fn get(&self, hash: &str) -> Option<&TransactionRecord> {
        self.records.get(hash)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Enrich a decoded transaction's inputs with the previous outputs they
    /// spend, looked up in the ledger. Fails if any referenced output is not
    /// locally known.
    pub fn resolve_inputs(
        &self,
        tx: &TransactionRecord,
    ) -> Result<Vec<ResolvedInput>, WalletError> {
        tx.inputs
            .iter()
            .map(|input| {
                let outpoint = &input.previous_output;
                let previous = self
                    .records
                    .get(&outpoint.hash)
                    .and_then(|prev| prev.outputs.get(outpoint.index as usize))
                    .ok_or_else(|| {
                        WalletError::UnknownPreviousOutput(outpoint.hash.clone(), outpoint.index)
                    })?;
                Ok(ResolvedInput {
                    previous_output: outpoint.clone(),
                    address: previous.address.clone(),
                    value: previous.value,
                    attachment: previous.attachment.clone(),
                })
            })
            .collect()
    }
}
