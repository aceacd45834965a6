//! Transaction construction.
//!
//! - `select`: greedy UTXO selection with per-asset change
//! - `builder`: draft assembly for every supported transaction shape

pub mod builder;
pub mod select;

pub use builder::{
    CertPolicy, DraftAttachment, DraftInput, DraftOutput, MultisigParams, Recipient,
    SignedTransaction, Signer, SignerProvider, TxBuilder, TxDraft, select_certs,
};
pub use select::{Selection, find_utxo};

/// Hard input-count ceiling; scripts above it exceed the network's
/// transaction size limit.
pub const MAX_TX_INPUTS: usize = 676;

/// Decimals of the base currency.
pub const ETP_DECIMALS: u8 = 8;
/// Symbol of the base currency.
pub const ETP_SYMBOL: &str = "ETP";

/// Default flat fee, in ETP base units.
pub const DEFAULT_FEE: u64 = 10_000;
/// Network fee for registering an avatar.
pub const AVATAR_REGISTER_FEE: u64 = 100_000_000;
/// Network fee for registering an asset, partly paid to miners.
pub const MST_REGISTER_FEE: u64 = 1_000_000_000;
