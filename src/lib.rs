//! Wallet engine for the Metaverse (MVS) chain: a local transaction ledger
//! kept in sync against a remote ledger source, pure UTXO and balance
//! derivation on top of it, and draft construction for every transaction
//! shape the wallet supports. Signing stays behind the [`transaction::Signer`]
//! seam; no key material enters this crate.

pub mod remote;
pub mod store;
pub mod transaction;
pub mod wallet;

pub use remote::{HttpLedgerSource, RemoteLedgerSource};
pub use store::{FileStore, MemoryStore, PersistentStore};
pub use transaction::{TxBuilder, TxDraft};
pub use wallet::{Balance, SyncConfig, SyncEngine, SyncStatus, WalletError};
