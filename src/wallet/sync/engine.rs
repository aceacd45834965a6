//! Wallet sync engine.
//!
//! The engine drives periodic and on-demand synchronization against the
//! remote ledger source. A pass refreshes the chain height and incrementally
//! fetches new transactions into the local ledger, then recomputes and
//! conditionally persists balances. It is a three-state machine:
//!
//! - `Idle`: up to date, waiting for the next stale tick
//! - `Syncing`: exactly one pass in flight (single-flight guarantee)
//! - `Offline`: the last pass failed; retried on the next stale tick
//!
//! Balances and height are never overwritten with partial results: a failed
//! step leaves the last-known-good values in place.

use crate::remote::RemoteLedgerSource;
use crate::store::{self, PersistentStore, keys};
use crate::transaction::builder::SignedTransaction;
use crate::wallet::sync::events::{EventDispatcher, WalletEvent, WalletEventHandler};
use crate::wallet::types::{SyncStatus, WalletError};
use crate::wallet::utxo::{self, Utxo};
use crate::wallet::{balances, ledger::Ledger, settings};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Data older than this is considered stale.
    pub update_interval: Duration,
    /// Cadence of the periodic staleness check.
    pub tick_interval: Duration,
    /// Maximum incremental-fetch pages per pass; a pass that exhausts the
    /// budget resumes from the advanced cursor on the next stale tick.
    pub max_pages: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(60),
            tick_interval: Duration::from_secs(5),
            max_pages: 64,
        }
    }
}

/// Whether a sync is due, given when data was last refreshed.
/// An unknown last-update time is always stale.
pub fn is_stale(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    match last_update {
        None => true,
        Some(last) => now - last > TimeDelta::seconds(interval.as_secs() as i64),
    }
}

/// Coordinator for ledger synchronization and balance recomputation.
pub struct SyncEngine {
    store: Arc<dyn PersistentStore>,
    remote: Arc<dyn RemoteLedgerSource>,
    ledger: tokio::sync::Mutex<Ledger>,
    dispatcher: tokio::sync::Mutex<EventDispatcher>,
    status: Mutex<SyncStatus>,
    /// Sole concurrency guard: checked and set before the first await of a
    /// pass, so no second aggregate computation can start while one runs.
    syncing: AtomicBool,
    /// Bumped on stop; an in-flight pass compares its captured generation
    /// before finalizing and discards stale completions.
    generation: AtomicU64,
    stopped: AtomicBool,
    config: SyncConfig,
}

impl SyncEngine {
    /// Create an engine over the given store and remote, restoring the ledger
    /// and last known height from persisted state.
    pub async fn new(
        store: Arc<dyn PersistentStore>,
        remote: Arc<dyn RemoteLedgerSource>,
        config: SyncConfig,
    ) -> Result<Self, WalletError> {
        let ledger = Ledger::load(store.as_ref()).await?;
        let last_height: u64 = store::get_json(store.as_ref(), keys::HEIGHT)
            .await?
            .unwrap_or(0);
        info!(
            "Sync engine starting with {} cached transactions at height {}",
            ledger.len(),
            last_height
        );

        Ok(Self {
            store,
            remote,
            ledger: tokio::sync::Mutex::new(ledger),
            dispatcher: tokio::sync::Mutex::new(EventDispatcher::new()),
            status: Mutex::new(SyncStatus {
                last_height,
                ..SyncStatus::default()
            }),
            syncing: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            config,
        })
    }

    /// Register an event handler; handlers run in registration order.
    pub async fn register_handler(&self, handler: Box<dyn WalletEventHandler>) {
        self.dispatcher.lock().await.register_handler(handler);
    }

    /// Current status, by value.
    pub fn status(&self) -> SyncStatus {
        self.status.lock().unwrap().clone()
    }

    fn with_status(&self, f: impl FnOnce(&mut SyncStatus)) {
        f(&mut self.status.lock().unwrap());
    }

    /// Whether cached data is stale enough to warrant a sync.
    pub fn is_update_needed(&self) -> bool {
        let last_update = self.status.lock().unwrap().last_update;
        is_stale(last_update, Utc::now(), self.config.update_interval)
    }

    /// Sync when stale, no-op otherwise.
    pub async fn sync_if_stale(&self) -> Result<(), WalletError> {
        if self.is_update_needed() {
            self.sync().await
        } else {
            Ok(())
        }
    }

    /// Run one synchronization pass.
    ///
    /// Returns immediately if a pass is already in flight. The height refresh
    /// and the ledger/balance refresh run independently and are joined; only
    /// when both succeed does the engine return to idle and stamp the update
    /// time. Any failure flips it offline with cached state untouched.
    pub async fn sync(&self) -> Result<(), WalletError> {
        if self.syncing.swap(true, Ordering::SeqCst) {
            debug!("Sync already in progress, skipping");
            return Ok(());
        }
        self.with_status(|s| s.syncing = true);
        let generation = self.generation.load(Ordering::SeqCst);

        let result =
            futures::future::try_join(self.refresh_height(), self.refresh_wallet()).await;

        self.syncing.store(false, Ordering::SeqCst);
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!("Engine stopped while syncing, discarding completion");
            self.with_status(|s| s.syncing = false);
            return Ok(());
        }

        match result {
            Ok((height, ())) => {
                self.with_status(|s| {
                    s.syncing = false;
                    s.offline = false;
                    s.last_update = Some(Utc::now());
                    s.last_height = height;
                });
                debug!("Sync pass completed at height {}", height);
                Ok(())
            }
            Err(e) => {
                warn!("Sync pass failed: {}", e);
                self.with_status(|s| {
                    s.syncing = false;
                    s.offline = true;
                });
                self.dispatcher
                    .lock()
                    .await
                    .dispatch(&WalletEvent::SyncFailed {
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Periodically sync while stale until `stop` is called. Stopping
    /// prevents future ticks but does not cancel an in-flight pass.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            interval.tick().await;
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.sync_if_stale().await {
                debug!("Scheduled sync failed, retrying on next stale tick: {}", e);
            }
        }
    }

    /// Detach the engine: no further ticks, and an in-flight pass will not
    /// finalize its status.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Hard reset through the engine's own dispatcher: wipe the store keeping
    /// user preferences, drop the in-memory ledger and reset status so the
    /// next pass resyncs from scratch. Registered handlers observe the
    /// `SettingsUpdated` event.
    pub async fn hard_reset(&self, new_version: &str) -> Result<(), WalletError> {
        {
            let mut dispatcher = self.dispatcher.lock().await;
            settings::hard_reset(self.store.as_ref(), &mut dispatcher, new_version).await?;
        }
        *self.ledger.lock().await = Ledger::new();
        self.with_status(|s| {
            s.last_update = None;
            s.last_height = 0;
        });
        Ok(())
    }

    async fn refresh_height(&self) -> Result<u64, WalletError> {
        let height = self.remote.height().await?;
        store::set_json(self.store.as_ref(), keys::HEIGHT, &height).await?;
        Ok(height)
    }

    async fn refresh_wallet(&self) -> Result<(), WalletError> {
        self.refresh_ledger().await?;
        self.recompute_and_persist().await
    }

    /// Incremental fetch: pull transaction pages above the cursor until the
    /// remote returns an empty page or the page budget runs out.
    async fn refresh_ledger(&self) -> Result<(), WalletError> {
        let addresses = self.tracked_addresses().await?;
        if addresses.is_empty() {
            return Ok(());
        }

        for page in 0..self.config.max_pages {
            let min_height = self.ledger.lock().await.cursor() + 1;
            let batch = self
                .remote
                .list_transactions(&addresses, min_height)
                .await?;
            if batch.is_empty() {
                break;
            }

            let cursor = {
                let mut ledger = self.ledger.lock().await;
                ledger.merge(batch);
                ledger.save(self.store.as_ref()).await?;
                ledger.cursor()
            };
            store::set_json(self.store.as_ref(), keys::LAST_TX_HEIGHT, &cursor).await?;
            self.dispatcher
                .lock()
                .await
                .dispatch(&WalletEvent::HeightAdvanced { height: cursor })
                .await;

            if page + 1 == self.config.max_pages {
                warn!(
                    "Fetch page budget ({}) exhausted at cursor {}, resuming next pass",
                    self.config.max_pages, cursor
                );
            }
        }
        Ok(())
    }

    /// Derive UTXOs from the ledger, aggregate balances, and persist them
    /// only when the snapshot changed.
    async fn recompute_and_persist(&self) -> Result<(), WalletError> {
        let transactions = self.ledger.lock().await.all();
        let tracked: HashSet<String> = self.tracked_addresses().await?.into_iter().collect();
        let utxos = utxo::compute_utxo(&transactions, &tracked);
        let height = self.current_height().await?;

        let balance = balances::recompute(&utxos, height);
        balances::add_assets_to_order(self.store.as_ref(), balance.mst.keys()).await?;

        let by_address = balances::recompute_by_address(&utxos, height);
        balances::persist_address_balances(self.store.as_ref(), &by_address).await?;

        if balances::persist_if_changed(self.store.as_ref(), &balance).await? {
            self.dispatcher
                .lock()
                .await
                .dispatch(&WalletEvent::BalancesChanged { balance })
                .await;
        }
        Ok(())
    }

    /// Last persisted chain height, falling back to the ledger cursor.
    pub async fn current_height(&self) -> Result<u64, WalletError> {
        match store::get_json(self.store.as_ref(), keys::HEIGHT).await? {
            Some(height) => Ok(height),
            None => Ok(self.ledger.lock().await.cursor()),
        }
    }

    pub async fn owned_addresses(&self) -> Result<Vec<String>, WalletError> {
        Ok(store::get_json(self.store.as_ref(), keys::ADDRESSES)
            .await?
            .unwrap_or_default())
    }

    pub async fn multisig_addresses(&self) -> Result<Vec<String>, WalletError> {
        Ok(
            store::get_json(self.store.as_ref(), keys::MULTISIG_ADDRESSES)
                .await?
                .unwrap_or_default(),
        )
    }

    async fn tracked_addresses(&self) -> Result<Vec<String>, WalletError> {
        let mut addresses = self.owned_addresses().await?;
        addresses.extend(self.multisig_addresses().await?);
        Ok(addresses)
    }

    /// Spendable outputs of the owned address set.
    pub async fn utxos(&self) -> Result<Vec<Utxo>, WalletError> {
        let transactions = self.ledger.lock().await.all();
        let owned: HashSet<String> = self.owned_addresses().await?.into_iter().collect();
        Ok(utxo::compute_utxo(&transactions, &owned))
    }

    /// Spendable outputs of the owned set, optionally restricted to one address.
    pub async fn utxos_from(&self, address: Option<&str>) -> Result<Vec<Utxo>, WalletError> {
        Ok(utxo::filter_by_address(self.utxos().await?, address))
    }

    /// Spendable outputs of a single multisig address.
    pub async fn multisig_utxos(&self, address: &str) -> Result<Vec<Utxo>, WalletError> {
        let transactions = self.ledger.lock().await.all();
        let addresses: HashSet<String> = std::iter::once(address.to_string()).collect();
        Ok(utxo::compute_utxo(&transactions, &addresses))
    }

    /// Broadcast a signed transaction and ingest it as an unconfirmed record
    /// so balances reflect it before the next confirmed fetch overwrites it.
    pub async fn broadcast_and_record(
        &self,
        signed: &SignedTransaction,
    ) -> Result<String, WalletError> {
        let response = self.remote.broadcast(&signed.raw).await?;
        let mut record = signed.record.clone();
        record.hash = response.hash.clone();
        record.height = 0;

        {
            let mut ledger = self.ledger.lock().await;
            ledger.merge(vec![record]);
            ledger.save(self.store.as_ref()).await?;
        }
        self.recompute_and_persist().await?;
        info!("Broadcast transaction {}", response.hash);
        Ok(response.hash)
    }
}
