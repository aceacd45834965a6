//! Remote ledger integration.
//!
//! Defines the contract the engine expects from the remote ledger service and
//! the domain types flowing across it, plus a JSON-over-HTTP client.

/// HTTP client for the remote ledger API
mod client;
/// Domain and wire type definitions
mod types;

pub use client::{HttpLedgerSource, RemoteLedgerSource};
pub use types::*;
