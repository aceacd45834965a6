//! Ledger synchronization.
//!
//! - `engine`: the sync state machine (idle / syncing / offline)
//! - `events`: typed events and the handler dispatcher

pub mod engine;
pub mod events;

pub use engine::{SyncConfig, SyncEngine, is_stale};
pub use events::{EventDispatcher, WalletEvent, WalletEventHandler};
