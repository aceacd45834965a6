//! Wallet state: the local transaction ledger, derived UTXO and balance
//! views, caches, settings and the sync machinery that keeps it all fresh.

pub mod balances;
pub mod cache;
pub mod ledger;
pub mod settings;
pub mod sync;
pub mod types;
pub mod utxo;

pub use ledger::Ledger;
pub use sync::{SyncConfig, SyncEngine, WalletEvent, WalletEventHandler};
pub use types::{AssetBalance, Balance, MitEntry, SyncStatus, WalletError};
pub use utxo::{Utxo, compute_utxo};
