//! Event system for wallet synchronization.
//!
//! Events decouple the sync logic from its observers: the engine and settings
//! operations emit typed events, and registered handlers react to them. This
//! replaces string-keyed topics with an enum consumers match on.

use crate::wallet::types::{Balance, WalletError};
use async_trait::async_trait;

/// Events emitted by the wallet engine.
#[derive(Debug, Clone)]
pub enum WalletEvent {
    /// The ledger cursor advanced during an incremental fetch.
    HeightAdvanced { height: u64 },
    /// A recomputed balance snapshot differed from the stored one.
    BalancesChanged { balance: Balance },
    /// A sync pass failed; the engine is offline until the next stale tick.
    SyncFailed { error: String },
    /// Settings (addresses, base currency, reset) changed.
    SettingsUpdated,
}

/// Trait for handling wallet events.
///
/// Implementors receive every dispatched event and can perform side effects.
#[async_trait]
pub trait WalletEventHandler: Send + Sync {
    /// Handle a single event.
    async fn handle(&mut self, event: &WalletEvent) -> Result<(), WalletError>;

    /// Name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Dispatcher fanning events out to registered handlers.
///
/// Handlers are called in registration order; a failing handler is logged and
/// does not stop the others.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn WalletEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&mut self, handler: Box<dyn WalletEventHandler>) {
        self.handlers.push(handler);
    }

    pub async fn dispatch(&mut self, event: &WalletEvent) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }
}
