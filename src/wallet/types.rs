use crate::remote::RemoteError;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wallet engine errors.
///
/// Transaction-construction and cache failures carry stable string codes as
/// their display output; callers surface the code rather than a stack trace.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("ERR_TOO_MANY_INPUTS")]
    TooManyInputs,

    #[error("ERR_INSUFFICIENT_BALANCE")]
    InsufficientBalance,

    #[error("ERR_FIND_MIT")]
    MitNotFound,

    #[error("ERR_GET_WHITELIST")]
    WhitelistUnavailable,

    #[error("ERR_GET_BLOCKTIME")]
    BlocktimeUnavailable,

    #[error("ERR_SAVE_ACCOUNT")]
    SaveAccount,

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("sync error: {0}")]
    Sync(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("unknown previous output {0}:{1}")]
    UnknownPreviousOutput(String, u32),
}

/// Frozen/available split for one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub frozen: u64,
    pub available: u64,
    pub decimals: u8,
}

impl AssetBalance {
    pub fn with_decimals(decimals: u8) -> Self {
        Self {
            frozen: 0,
            available: 0,
            decimals,
        }
    }

    pub fn total(&self) -> u64 {
        self.frozen + self.available
    }
}

/// One non-fungible token held by a tracked address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MitEntry {
    pub symbol: String,
    pub address: String,
    #[serde(default)]
    pub content: String,
}

/// Per-run balance snapshot derived from the UTXO set.
///
/// MST balances use a `BTreeMap` so serialization is deterministic and the
/// change-detected persistence compares structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(rename = "ETP")]
    pub etp: AssetBalance,
    #[serde(rename = "MST")]
    pub mst: BTreeMap<String, AssetBalance>,
    #[serde(rename = "MIT")]
    pub mit: Vec<MitEntry>,
}

impl Default for Balance {
    fn default() -> Self {
        Self {
            etp: AssetBalance::with_decimals(crate::transaction::ETP_DECIMALS),
            mst: BTreeMap::new(),
            mit: Vec::new(),
        }
    }
}

/// Synchronization status owned exclusively by the sync engine.
/// Consumers receive copies, never shared references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub syncing: bool,
    pub offline: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub last_height: u64,
}
