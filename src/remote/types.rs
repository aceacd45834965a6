//! Domain types shared between the remote ledger source and the local engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reference to a prior transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: String,
    pub index: u32,
}

/// Transaction input spending a prior output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(rename = "previousOutput")]
    pub previous_output: OutPoint,
}

/// Kinds of certificates gating asset symbol namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertKind {
    /// Permission to issue the exact symbol.
    Issue,
    /// Permission over every symbol under a domain prefix.
    Domain,
    /// Permission to name a new symbol inside a domain.
    Naming,
}

/// Typed payload carried by a transaction output.
///
/// Every consumption site matches exhaustively, so adding a variant is a
/// compile-time checklist of balance aggregation, UTXO filtering and
/// certificate selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Attachment {
    /// Plain ETP value transfer.
    EtpTransfer,
    /// Issuance of a fungible asset (MST).
    AssetIssue {
        symbol: String,
        quantity: u64,
        decimals: u8,
        issuer: String,
        description: String,
        #[serde(rename = "secondaryIssueThreshold", default)]
        secondary_issue_threshold: i32,
    },
    /// Transfer of a fungible asset.
    AssetTransfer {
        symbol: String,
        quantity: u64,
        decimals: u8,
    },
    /// Certificate output gating an asset namespace.
    AssetCert { symbol: String, cert: CertKind },
    /// Non-fungible token output.
    Mit {
        symbol: String,
        #[serde(default)]
        content: String,
    },
}

impl Attachment {
    /// Symbol carried by the attachment, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Attachment::EtpTransfer => None,
            Attachment::AssetIssue { symbol, .. }
            | Attachment::AssetTransfer { symbol, .. }
            | Attachment::AssetCert { symbol, .. }
            | Attachment::Mit { symbol, .. } => Some(symbol),
        }
    }

    /// Fungible quantity carried by the attachment, if any.
    pub fn quantity(&self) -> Option<u64> {
        match self {
            Attachment::AssetIssue { quantity, .. }
            | Attachment::AssetTransfer { quantity, .. } => Some(*quantity),
            _ => None,
        }
    }

    /// Whether the attachment carries fungible value that coin selection may
    /// pick up implicitly. Certs and MITs move only by explicit request.
    pub fn is_countable(&self) -> bool {
        matches!(
            self,
            Attachment::EtpTransfer
                | Attachment::AssetIssue { .. }
                | Attachment::AssetTransfer { .. }
        )
    }
}

/// Time-release schedule for a locked asset output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttenuationParams {
    /// Total lock duration in blocks.
    #[serde(rename = "lockPeriod")]
    pub lock_period: u64,
    /// Number of release periods.
    #[serde(rename = "totalPeriodCount", default)]
    pub total_period_count: u32,
    /// Release periods already elapsed.
    #[serde(rename = "currentPeriod", default)]
    pub current_period: u32,
    /// Blocks until the next release.
    #[serde(rename = "nextInterval", default)]
    pub next_interval: u64,
}

/// Transaction output: owning address, ETP value, typed attachment and
/// optional lock parameters. The output index is its position in the
/// transaction's output list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub value: u64,
    pub attachment: Attachment,
    /// ETP lock duration in blocks, 0 when unlocked.
    #[serde(rename = "lockedHeightRange", default)]
    pub locked_height_range: u64,
    /// Attenuation schedule for locked asset outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attenuation: Option<AttenuationParams>,
}

/// Transaction as stored in the local ledger, keyed by its hash.
/// A height of 0 means the transaction is not yet confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    #[serde(default)]
    pub height: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl TransactionRecord {
    pub fn is_confirmed(&self) -> bool {
        self.height > 0
    }
}

/// Response to broadcasting a raw transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub hash: String,
}

/// Quotes for one symbol, keyed by fiat currency code.
pub type TickerQuotes = HashMap<String, f64>;

/// Errors from the remote ledger source.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no data returned")]
    NoData,

    #[error("remote API error: {0}")]
    Api(String),
}
