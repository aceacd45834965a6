//! Transaction draft assembly.
//!
//! Each supported shape (transfer, multi-recipient transfer, cross-chain swap,
//! deposit, avatar registration, asset issuance, MIT registration and
//! transfer) is built as a `TxDraft`: resolved inputs plus typed outputs.
//! Drafts carry no signatures; a `Signer` implementation turns a draft into a
//! broadcastable transaction. Key material never enters this module.

use crate::remote::{Attachment, CertKind, OutPoint, TransactionRecord};
use crate::transaction::select::{Selection, find_utxo};
use crate::transaction::{
    AVATAR_REGISTER_FEE, DEFAULT_FEE, ETP_DECIMALS, ETP_SYMBOL, MST_REGISTER_FEE,
};
use crate::wallet::types::WalletError;
use crate::wallet::utxo::{self, Utxo};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// A fully resolved input: the outpoint plus the fields needed for signing.
#[derive(Debug, Clone)]
pub struct DraftInput {
    pub previous_output: OutPoint,
    pub address: String,
    pub value: u64,
    pub attachment: Attachment,
}

impl From<&Utxo> for DraftInput {
    fn from(utxo: &Utxo) -> Self {
        Self {
            previous_output: utxo.outpoint(),
            address: utxo.address.clone(),
            value: utxo.value,
            attachment: utxo.attachment.clone(),
        }
    }
}

/// Output payload of a draft. Most outputs reuse the ledger attachment
/// types; avatar registration exists only at construction time.
#[derive(Debug, Clone)]
pub enum DraftAttachment {
    Ledger(Attachment),
    AvatarRegister { symbol: String, address: String },
}

impl From<Attachment> for DraftAttachment {
    fn from(attachment: Attachment) -> Self {
        DraftAttachment::Ledger(attachment)
    }
}

#[derive(Debug, Clone)]
pub struct DraftOutput {
    pub address: String,
    pub value: u64,
    pub attachment: DraftAttachment,
    /// ETP lock duration in blocks, 0 when unlocked.
    pub locked_height_range: u64,
    /// Raw attenuation model script for locked asset outputs.
    pub attenuation_model: Option<String>,
    /// Avatar name attached to the recipient, when known.
    pub avatar: Option<String>,
}

impl DraftOutput {
    fn new(address: &str, value: u64, attachment: DraftAttachment) -> Self {
        Self {
            address: address.to_string(),
            value,
            attachment,
            locked_height_range: 0,
            attenuation_model: None,
            avatar: None,
        }
    }
}

/// An unsigned transaction: what the wallet asserts, before any signature.
#[derive(Debug, Clone, Default)]
pub struct TxDraft {
    pub inputs: Vec<DraftInput>,
    pub outputs: Vec<DraftOutput>,
    pub messages: Vec<String>,
}

/// A signed, serialized transaction plus the local record used to reflect it
/// as unconfirmed until the network reports it back.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: String,
    pub record: TransactionRecord,
}

/// Parameters of an m-of-n multisig address.
#[derive(Debug, Clone)]
pub struct MultisigParams {
    pub required: u8,
    pub public_keys: Vec<String>,
}

/// Signing seam. Implementations hold the key material; drafts cross this
/// boundary in one direction only.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, draft: &TxDraft) -> Result<SignedTransaction, WalletError>;

    async fn sign_multisig(
        &self,
        draft: &TxDraft,
        params: &MultisigParams,
    ) -> Result<SignedTransaction, WalletError>;
}

/// Unlocks a `Signer` from a passphrase.
#[async_trait]
pub trait SignerProvider: Send + Sync {
    async fn signer(&self, passphrase: &str) -> Result<Box<dyn Signer>, WalletError>;
}

/// How issuance combines domain certs with exact-symbol certs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CertPolicy {
    /// Domain-prefix and exact-symbol naming/issue certs pass together.
    #[default]
    Additive,
    /// Exact-symbol certs are a fallback, taken only without a domain cert.
    Exclusive,
}

/// Certificates to spend when issuing `symbol`.
///
/// With `use_naming_cert` only the exact-symbol naming cert is taken.
/// Otherwise the domain cert covering the symbol's prefix qualifies, and so do
/// the exact-symbol naming and issue certs, combined per the policy.
pub fn select_certs<'a>(
    pool: &'a [Utxo],
    symbol: &str,
    use_naming_cert: bool,
    policy: CertPolicy,
) -> Vec<&'a Utxo> {
    if use_naming_cert {
        return utxo::certs_for(pool, symbol, CertKind::Naming);
    }

    let domain = symbol.split('.').next().unwrap_or(symbol);
    let mut certs = utxo::certs_for(pool, domain, CertKind::Domain);
    if policy == CertPolicy::Additive || certs.is_empty() {
        certs.extend(utxo::certs_for(pool, symbol, CertKind::Naming));
        certs.extend(utxo::certs_for(pool, symbol, CertKind::Issue));
    }
    certs
}

pub struct Recipient {
    pub address: String,
    pub symbol: String,
    pub amount: u64,
}

pub struct SendParams {
    pub recipient: String,
    /// Avatar name of the recipient, attached to the output when known.
    pub recipient_avatar: Option<String>,
    pub symbol: String,
    pub amount: u64,
    pub from: Option<String>,
    pub change_address: Option<String>,
    pub fee: Option<u64>,
    pub messages: Vec<String>,
}

pub struct SendMoreParams {
    pub recipients: Vec<Recipient>,
    pub from: Option<String>,
    pub change_address: Option<String>,
    pub messages: Vec<String>,
}

pub struct SwapParams {
    pub recipient: String,
    pub symbol: String,
    pub amount: u64,
    /// Bridge fee, paid as an extra ETP output.
    pub swap_fee: u64,
    pub swap_fee_address: String,
    /// Address on the target chain, carried as a transaction message.
    pub target_address: String,
    pub from: Option<String>,
    pub change_address: Option<String>,
    pub fee: Option<u64>,
}

pub struct DepositParams {
    pub symbol: String,
    pub amount: u64,
    /// Lock duration in blocks.
    pub lock_blocks: u64,
    /// Defaults to the first selected input's address.
    pub recipient: Option<String>,
    pub from: Option<String>,
    pub change_address: Option<String>,
    pub fee: Option<u64>,
    pub messages: Vec<String>,
}

pub struct RegisterAvatarParams {
    pub symbol: String,
    pub address: String,
    /// Part of the registration fee redirected to a bounty address.
    pub bounty: Option<(String, u64)>,
    pub from: Option<String>,
    pub change_address: Option<String>,
}

pub struct RegisterMitParams {
    pub symbol: String,
    pub content: String,
    pub recipient: String,
    pub from: Option<String>,
    pub change_address: Option<String>,
    pub fee: Option<u64>,
}

pub struct TransferMitParams {
    pub symbol: String,
    pub recipient: String,
    /// Address whose outputs fund the fee; unrestricted when absent.
    pub fee_address: Option<String>,
    pub change_address: Option<String>,
    pub fee: Option<u64>,
}

pub struct IssueAssetParams {
    pub symbol: String,
    pub quantity: u64,
    pub decimals: u8,
    pub issuer: String,
    pub description: String,
    pub secondary_issue_threshold: i32,
    pub recipient: String,
    /// Spend the symbol's naming cert instead of the domain cert.
    pub use_naming_cert: bool,
    /// When issuing under a domain cert, also mint a naming cert for the
    /// symbol so it can be reissued without the domain cert later.
    pub create_new_domain_cert: bool,
    pub cert_policy: CertPolicy,
    pub from: Option<String>,
    pub change_address: Option<String>,
}

/// Draft builder over a UTXO pool at a given chain height.
pub struct TxBuilder<'a> {
    pool: &'a [Utxo],
    current_height: u64,
}

impl<'a> TxBuilder<'a> {
    pub fn new(pool: &'a [Utxo], current_height: u64) -> Self {
        Self {
            pool,
            current_height,
        }
    }

    fn restricted_pool(&self, from: Option<&str>) -> Vec<Utxo> {
        utxo::filter_by_address(self.pool.to_vec(), from)
    }

    fn select(
        &self,
        from: Option<&str>,
        targets: &BTreeMap<String, u64>,
        fee: u64,
    ) -> Result<Selection, WalletError> {
        find_utxo(&self.restricted_pool(from), targets, self.current_height, fee)
    }

    /// Change goes to the explicit address when given, otherwise back to the
    /// first selected input's address.
    fn change_outputs(selection: &Selection, change_address: Option<&str>) -> Vec<DraftOutput> {
        let default_address = selection.utxos.first().map(|utxo| utxo.address.as_str());
        let Some(address) = change_address.or(default_address) else {
            return Vec::new();
        };

        selection
            .change
            .iter()
            .map(|(symbol, amount)| {
                if symbol == ETP_SYMBOL {
                    DraftOutput::new(address, *amount, Attachment::EtpTransfer.into())
                } else {
                    let decimals = selection
                        .utxos
                        .iter()
                        .find(|utxo| utxo.attachment.symbol() == Some(symbol))
                        .and_then(|utxo| match &utxo.attachment {
                            Attachment::AssetIssue { decimals, .. }
                            | Attachment::AssetTransfer { decimals, .. } => Some(*decimals),
                            _ => None,
                        })
                        .unwrap_or(ETP_DECIMALS);
                    DraftOutput::new(
                        address,
                        0,
                        Attachment::AssetTransfer {
                            symbol: symbol.clone(),
                            quantity: *amount,
                            decimals,
                        }
                        .into(),
                    )
                }
            })
            .collect()
    }

    fn assemble(
        selection: Selection,
        mut outputs: Vec<DraftOutput>,
        change_address: Option<&str>,
        messages: Vec<String>,
    ) -> TxDraft {
        outputs.extend(Self::change_outputs(&selection, change_address));
        TxDraft {
            inputs: selection.utxos.iter().map(DraftInput::from).collect(),
            outputs,
            messages,
        }
    }

    fn transfer(
        &self,
        recipients: &[Recipient],
        fee: u64,
        from: Option<&str>,
        change_address: Option<&str>,
        messages: Vec<String>,
    ) -> Result<TxDraft, WalletError> {
        let mut targets: BTreeMap<String, u64> = BTreeMap::new();
        for recipient in recipients {
            *targets.entry(recipient.symbol.clone()).or_insert(0) += recipient.amount;
        }
        let selection = self.select(from, &targets, fee)?;

        let outputs = recipients
            .iter()
            .map(|recipient| {
                if recipient.symbol == ETP_SYMBOL {
                    DraftOutput::new(
                        &recipient.address,
                        recipient.amount,
                        Attachment::EtpTransfer.into(),
                    )
                } else {
                    let decimals = asset_decimals(&selection.utxos, &recipient.symbol);
                    DraftOutput::new(
                        &recipient.address,
                        0,
                        Attachment::AssetTransfer {
                            symbol: recipient.symbol.clone(),
                            quantity: recipient.amount,
                            decimals,
                        }
                        .into(),
                    )
                }
            })
            .collect();
        Ok(Self::assemble(selection, outputs, change_address, messages))
    }

    /// Single-recipient transfer of ETP or an asset.
    pub fn send(&self, params: SendParams) -> Result<TxDraft, WalletError> {
        let mut draft = self.transfer(
            &[Recipient {
                address: params.recipient,
                symbol: params.symbol,
                amount: params.amount,
            }],
            params.fee.unwrap_or(DEFAULT_FEE),
            params.from.as_deref(),
            params.change_address.as_deref(),
            params.messages,
        )?;
        draft.outputs[0].avatar = params.recipient_avatar;
        Ok(draft)
    }

    /// Transfer from a multisig address: drafted like `send` over the
    /// address's pool, signed with the m-of-n participant parameters.
    pub async fn send_multisig(
        &self,
        params: SendParams,
        multisig: &MultisigParams,
        signer: &dyn Signer,
    ) -> Result<SignedTransaction, WalletError> {
        let draft = self.send(params)?;
        signer.sign_multisig(&draft, multisig).await
    }

    /// Multi-recipient transfer; the flat fee scales with recipient count.
    pub fn send_more(&self, params: SendMoreParams) -> Result<TxDraft, WalletError> {
        let fee = DEFAULT_FEE * params.recipients.len() as u64;
        self.transfer(
            &params.recipients,
            fee,
            params.from.as_deref(),
            params.change_address.as_deref(),
            params.messages,
        )
    }

    /// Cross-chain swap: a transfer carrying the bridge fee output and the
    /// target-chain address as a message.
    pub fn send_swap(&self, params: SwapParams) -> Result<TxDraft, WalletError> {
        let mut targets: BTreeMap<String, u64> = BTreeMap::new();
        targets.insert(params.symbol.clone(), params.amount);
        *targets.entry(ETP_SYMBOL.to_string()).or_insert(0) += params.swap_fee;

        let selection = self.select(
            params.from.as_deref(),
            &targets,
            params.fee.unwrap_or(DEFAULT_FEE),
        )?;

        let mut outputs = Vec::new();
        if params.symbol == ETP_SYMBOL {
            outputs.push(DraftOutput::new(
                &params.recipient,
                params.amount,
                Attachment::EtpTransfer.into(),
            ));
        } else {
            let decimals = asset_decimals(&selection.utxos, &params.symbol);
            outputs.push(DraftOutput::new(
                &params.recipient,
                0,
                Attachment::AssetTransfer {
                    symbol: params.symbol.clone(),
                    quantity: params.amount,
                    decimals,
                }
                .into(),
            ));
        }
        outputs.push(DraftOutput::new(
            &params.swap_fee_address,
            params.swap_fee,
            Attachment::EtpTransfer.into(),
        ));

        Ok(Self::assemble(
            selection,
            outputs,
            params.change_address.as_deref(),
            vec![params.target_address],
        ))
    }

    /// Time-locked deposit. ETP locks via the output height range, assets via
    /// an attenuation model.
    pub fn deposit(&self, params: DepositParams) -> Result<TxDraft, WalletError> {
        let targets = BTreeMap::from([(params.symbol.clone(), params.amount)]);
        let selection = self.select(
            params.from.as_deref(),
            &targets,
            params.fee.unwrap_or(DEFAULT_FEE),
        )?;

        let recipient = params
            .recipient
            .or_else(|| selection.utxos.first().map(|utxo| utxo.address.clone()))
            .ok_or(WalletError::InsufficientBalance)?;

        let output = if params.symbol == ETP_SYMBOL {
            let mut output =
                DraftOutput::new(&recipient, params.amount, Attachment::EtpTransfer.into());
            output.locked_height_range = params.lock_blocks;
            output
        } else {
            let decimals = asset_decimals(&selection.utxos, &params.symbol);
            let mut output = DraftOutput::new(
                &recipient,
                0,
                Attachment::AssetTransfer {
                    symbol: params.symbol.clone(),
                    quantity: params.amount,
                    decimals,
                }
                .into(),
            );
            output.attenuation_model = Some(format!(
                "PN=0;LH={lock};TYPE=1;LQ={quantity};LP={lock};UN=1",
                lock = params.lock_blocks,
                quantity = params.amount,
            ));
            output
        };

        Ok(Self::assemble(
            selection,
            vec![output],
            params.change_address.as_deref(),
            params.messages,
        ))
    }

    /// Avatar registration. The fixed fee funds the registration; an optional
    /// bounty share is redirected to a bounty address instead of the miners.
    pub fn register_avatar(&self, params: RegisterAvatarParams) -> Result<TxDraft, WalletError> {
        let bounty_value = params.bounty.as_ref().map(|(_, value)| *value).unwrap_or(0);
        let targets = BTreeMap::from([(ETP_SYMBOL.to_string(), bounty_value)]);
        let selection = self.select(
            params.from.as_deref(),
            &targets,
            AVATAR_REGISTER_FEE.saturating_sub(bounty_value),
        )?;

        let mut outputs = vec![DraftOutput::new(
            &params.address,
            0,
            DraftAttachment::AvatarRegister {
                symbol: params.symbol,
                address: params.address.clone(),
            },
        )];
        if let Some((bounty_address, value)) = params.bounty {
            outputs.push(DraftOutput::new(
                &bounty_address,
                value,
                Attachment::EtpTransfer.into(),
            ));
        }

        Ok(Self::assemble(
            selection,
            outputs,
            params.change_address.as_deref(),
            Vec::new(),
        ))
    }

    /// Mint a new MIT to a recipient.
    pub fn register_mit(&self, params: RegisterMitParams) -> Result<TxDraft, WalletError> {
        let selection = self.select(
            params.from.as_deref(),
            &BTreeMap::new(),
            params.fee.unwrap_or(DEFAULT_FEE),
        )?;
        let output = DraftOutput::new(
            &params.recipient,
            0,
            Attachment::Mit {
                symbol: params.symbol,
                content: params.content,
            }
            .into(),
        );
        Ok(Self::assemble(
            selection,
            vec![output],
            params.change_address.as_deref(),
            Vec::new(),
        ))
    }

    /// Move a MIT to a new owner. The pool must hold exactly one output for
    /// the symbol; the fee is funded separately, optionally from a dedicated
    /// fee address.
    pub fn transfer_mit(&self, params: TransferMitParams) -> Result<TxDraft, WalletError> {
        let mits = utxo::filter_mit(self.pool, &params.symbol);
        let [mit] = mits.as_slice() else {
            return Err(WalletError::MitNotFound);
        };
        let content = match &mit.attachment {
            Attachment::Mit { content, .. } => content.clone(),
            _ => String::new(),
        };

        let selection = self.select(
            params.fee_address.as_deref(),
            &BTreeMap::new(),
            params.fee.unwrap_or(DEFAULT_FEE),
        )?;

        let mit_input = DraftInput::from(*mit);
        let output = DraftOutput::new(
            &params.recipient,
            0,
            Attachment::Mit {
                symbol: params.symbol,
                content,
            }
            .into(),
        );

        let mut draft = Self::assemble(
            selection,
            vec![output],
            params.change_address.as_deref(),
            Vec::new(),
        );
        draft.inputs.insert(0, mit_input);
        Ok(draft)
    }

    /// Issue a new asset, spending the certificates that authorize the symbol
    /// and re-emitting them to their holders.
    pub fn issue_asset(&self, params: IssueAssetParams) -> Result<TxDraft, WalletError> {
        let certs: Vec<Utxo> = select_certs(
            self.pool,
            &params.symbol,
            params.use_naming_cert,
            params.cert_policy,
        )
        .into_iter()
        .cloned()
        .collect();

        let selection = self.select(params.from.as_deref(), &BTreeMap::new(), MST_REGISTER_FEE)?;

        let mut outputs = vec![DraftOutput::new(
            &params.recipient,
            0,
            Attachment::AssetIssue {
                symbol: params.symbol.clone(),
                quantity: params.quantity,
                decimals: params.decimals,
                issuer: params.issuer,
                description: params.description,
                secondary_issue_threshold: params.secondary_issue_threshold,
            }
            .into(),
        )];

        // Spent certs come straight back to their holders.
        for cert in &certs {
            outputs.push(DraftOutput::new(
                &cert.address,
                0,
                cert.attachment.clone().into(),
            ));
        }
        if params.create_new_domain_cert && !params.use_naming_cert {
            outputs.push(DraftOutput::new(
                &params.recipient,
                0,
                Attachment::AssetCert {
                    symbol: params.symbol.clone(),
                    cert: CertKind::Naming,
                }
                .into(),
            ));
        }

        let mut draft = Self::assemble(
            selection,
            outputs,
            params.change_address.as_deref(),
            Vec::new(),
        );
        for cert in certs.iter().rev() {
            draft.inputs.insert(0, DraftInput::from(cert));
        }
        Ok(draft)
    }
}

fn asset_decimals(selected: &[Utxo], symbol: &str) -> u8 {
    selected
        .iter()
        .find_map(|utxo| match &utxo.attachment {
            Attachment::AssetIssue {
                symbol: s,
                decimals,
                ..
            }
            | Attachment::AssetTransfer {
                symbol: s,
                decimals,
                ..
            } if s == symbol => Some(*decimals),
            _ => None,
        })
        .unwrap_or(ETP_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{TxInput, TxOutput};

    fn etp_utxo(hash: &str, address: &str, value: u64) -> Utxo {
        Utxo {
            hash: hash.to_string(),
            index: 0,
            height: 10,
            address: address.to_string(),
            value,
            attachment: Attachment::EtpTransfer,
            locked_height_range: 0,
            attenuation: None,
        }
    }

    fn asset_utxo(hash: &str, address: &str, symbol: &str, quantity: u64) -> Utxo {
        Utxo {
            hash: hash.to_string(),
            index: 0,
            height: 10,
            address: address.to_string(),
            value: 0,
            attachment: Attachment::AssetTransfer {
                symbol: symbol.into(),
                quantity,
                decimals: 4,
            },
            locked_height_range: 0,
            attenuation: None,
        }
    }

    fn cert_utxo(hash: &str, address: &str, symbol: &str, cert: CertKind) -> Utxo {
        Utxo {
            hash: hash.to_string(),
            index: 0,
            height: 10,
            address: address.to_string(),
            value: 0,
            attachment: Attachment::AssetCert {
                symbol: symbol.into(),
                cert,
            },
            locked_height_range: 0,
            attenuation: None,
        }
    }

    fn mit_utxo(hash: &str, address: &str, symbol: &str, content: &str) -> Utxo {
        Utxo {
            hash: hash.to_string(),
            index: 0,
            height: 10,
            address: address.to_string(),
            value: 0,
            attachment: Attachment::Mit {
                symbol: symbol.into(),
                content: content.into(),
            },
            locked_height_range: 0,
            attenuation: None,
        }
    }

    fn send_params(recipient: &str, amount: u64) -> SendParams {
        SendParams {
            recipient: recipient.to_string(),
            recipient_avatar: None,
            symbol: ETP_SYMBOL.to_string(),
            amount,
            from: None,
            change_address: None,
            fee: None,
            messages: Vec::new(),
        }
    }

    #[test]
    fn change_defaults_to_first_input_address() {
        let pool = vec![etp_utxo("a", "sender", 1_000_000)];
        let builder = TxBuilder::new(&pool, 100);

        let draft = builder.send(send_params("dest", 100_000)).unwrap();
        // Recipient output plus change back to the input's own address.
        assert_eq!(draft.outputs.len(), 2);
        let change = &draft.outputs[1];
        assert_eq!(change.address, "sender");
        assert_eq!(change.value, 1_000_000 - 100_000 - DEFAULT_FEE);
    }

    #[test]
    fn explicit_change_address_wins() {
        let pool = vec![etp_utxo("a", "sender", 1_000_000)];
        let builder = TxBuilder::new(&pool, 100);

        let mut params = send_params("dest", 100_000);
        params.change_address = Some("elsewhere".to_string());
        let draft = builder.send(params).unwrap();
        assert_eq!(draft.outputs[1].address, "elsewhere");
    }

    #[test]
    fn send_more_scales_fee_per_recipient() {
        let pool = vec![etp_utxo("a", "sender", 1_000_000)];
        let builder = TxBuilder::new(&pool, 100);

        let draft = builder
            .send_more(SendMoreParams {
                recipients: vec![
                    Recipient {
                        address: "r1".into(),
                        symbol: ETP_SYMBOL.into(),
                        amount: 100,
                    },
                    Recipient {
                        address: "r2".into(),
                        symbol: ETP_SYMBOL.into(),
                        amount: 200,
                    },
                ],
                from: None,
                change_address: None,
                messages: Vec::new(),
            })
            .unwrap();

        let change = draft.outputs.last().unwrap();
        assert_eq!(change.value, 1_000_000 - 300 - 2 * DEFAULT_FEE);
    }

    #[test]
    fn swap_adds_bridge_fee_output_and_message() {
        let pool = vec![
            asset_utxo("a", "sender", "MVS.ZGC", 1_000),
            etp_utxo("b", "sender", 10_000_000),
        ];
        let builder = TxBuilder::new(&pool, 100);

        let draft = builder
            .send_swap(SwapParams {
                recipient: "bridge".into(),
                symbol: "MVS.ZGC".into(),
                amount: 500,
                swap_fee: 100_000_000 / 100,
                swap_fee_address: "fee-collector".into(),
                target_address: "0xdeadbeef".into(),
                from: None,
                change_address: None,
                fee: None,
            })
            .unwrap();

        assert_eq!(draft.messages, vec!["0xdeadbeef".to_string()]);
        assert!(
            draft
                .outputs
                .iter()
                .any(|o| o.address == "fee-collector" && o.value == 1_000_000)
        );
    }

    #[test]
    fn etp_deposit_sets_height_lock() {
        let pool = vec![etp_utxo("a", "sender", 10_000_000)];
        let builder = TxBuilder::new(&pool, 100);

        let draft = builder
            .deposit(DepositParams {
                symbol: ETP_SYMBOL.into(),
                amount: 1_000_000,
                lock_blocks: 25200,
                recipient: None,
                from: None,
                change_address: None,
                fee: None,
                messages: Vec::new(),
            })
            .unwrap();

        let deposit = &draft.outputs[0];
        // Recipient defaults to the first input's address.
        assert_eq!(deposit.address, "sender");
        assert_eq!(deposit.locked_height_range, 25200);
        assert!(deposit.attenuation_model.is_none());
    }

    #[test]
    fn asset_deposit_uses_attenuation_model() {
        let pool = vec![
            asset_utxo("a", "sender", "MVS.ZGC", 1_000),
            etp_utxo("b", "sender", 1_000_000),
        ];
        let builder = TxBuilder::new(&pool, 100);

        let draft = builder
            .deposit(DepositParams {
                symbol: "MVS.ZGC".into(),
                amount: 600,
                lock_blocks: 1000,
                recipient: None,
                from: None,
                change_address: None,
                fee: None,
                messages: Vec::new(),
            })
            .unwrap();

        let deposit = &draft.outputs[0];
        assert_eq!(
            deposit.attenuation_model.as_deref(),
            Some("PN=0;LH=1000;TYPE=1;LQ=600;LP=1000;UN=1")
        );
        assert_eq!(deposit.locked_height_range, 0);
    }

    #[test]
    fn naming_cert_selected_for_exact_symbol() {
        let pool = vec![
            cert_utxo("c1", "holder", "MVS.ZGC", CertKind::Naming),
            cert_utxo("c2", "holder", "MVS.OTHER", CertKind::Naming),
        ];
        let certs = select_certs(&pool, "MVS.ZGC", true, CertPolicy::Exclusive);
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].hash, "c1");
    }

    #[test]
    fn domain_cert_selected_by_prefix() {
        let pool = vec![
            cert_utxo("c1", "holder", "MVS", CertKind::Domain),
            cert_utxo("c2", "holder", "OTHER", CertKind::Domain),
        ];
        let certs = select_certs(&pool, "MVS.ZGC", false, CertPolicy::Additive);
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].hash, "c1");
    }

    #[test]
    fn additive_policy_combines_domain_and_symbol_certs() {
        let pool = vec![
            cert_utxo("domain", "holder", "MVS", CertKind::Domain),
            cert_utxo("naming", "holder", "MVS.ZGC", CertKind::Naming),
            cert_utxo("issue", "holder", "MVS.ZGC", CertKind::Issue),
        ];
        let additive = select_certs(&pool, "MVS.ZGC", false, CertPolicy::Additive);
        assert_eq!(additive.len(), 3);

        // Exclusive stops at the domain cert when one exists.
        let exclusive = select_certs(&pool, "MVS.ZGC", false, CertPolicy::Exclusive);
        assert_eq!(exclusive.len(), 1);
        assert_eq!(exclusive[0].hash, "domain");
    }

    #[test]
    fn symbol_certs_are_the_fallback_without_a_domain_cert() {
        let pool = vec![
            cert_utxo("naming", "holder", "MVS.ZGC", CertKind::Naming),
            cert_utxo("issue", "holder", "MVS.ZGC", CertKind::Issue),
        ];
        let certs = select_certs(&pool, "MVS.ZGC", false, CertPolicy::Exclusive);
        assert_eq!(certs.len(), 2);
    }

    #[test]
    fn issue_asset_reemits_spent_certs() {
        let pool = vec![
            cert_utxo("cert", "cert-holder", "MVS", CertKind::Domain),
            etp_utxo("funds", "issuer-addr", 2_000_000_000),
        ];
        let builder = TxBuilder::new(&pool, 100);

        let draft = builder
            .issue_asset(IssueAssetParams {
                symbol: "MVS.ZGC".into(),
                quantity: 1_000_000,
                decimals: 8,
                issuer: "issuer".into(),
                description: "gold".into(),
                secondary_issue_threshold: 0,
                recipient: "issuer-addr".into(),
                use_naming_cert: false,
                create_new_domain_cert: true,
                cert_policy: CertPolicy::default(),
                from: None,
                change_address: None,
            })
            .unwrap();

        // Cert input first, then fee inputs.
        assert_eq!(draft.inputs[0].previous_output.hash, "cert");
        // Domain cert returned to its holder.
        assert!(draft.outputs.iter().any(|o| {
            o.address == "cert-holder"
                && matches!(
                    &o.attachment,
                    DraftAttachment::Ledger(Attachment::AssetCert {
                        cert: CertKind::Domain,
                        ..
                    })
                )
        }));
        // New naming cert minted for the issued symbol.
        assert!(draft.outputs.iter().any(|o| {
            matches!(
                &o.attachment,
                DraftAttachment::Ledger(Attachment::AssetCert {
                    symbol,
                    cert: CertKind::Naming,
                }) if symbol == "MVS.ZGC"
            )
        }));
    }

    #[test]
    fn mit_transfer_requires_exactly_one_match() {
        let builder_pool = vec![etp_utxo("fee", "sender", 1_000_000)];
        let builder = TxBuilder::new(&builder_pool, 100);
        let params = |symbol: &str| TransferMitParams {
            symbol: symbol.to_string(),
            recipient: "new-owner".into(),
            fee_address: None,
            change_address: None,
            fee: None,
        };

        // No MIT in the pool.
        let err = builder.transfer_mit(params("BADGE")).unwrap_err();
        assert_eq!(err.to_string(), "ERR_FIND_MIT");

        // Two matching MITs are just as fatal.
        let pool = vec![
            mit_utxo("m1", "sender", "BADGE", "a"),
            mit_utxo("m2", "sender", "BADGE", "b"),
            etp_utxo("fee", "sender", 1_000_000),
        ];
        let builder = TxBuilder::new(&pool, 100);
        let err = builder.transfer_mit(params("BADGE")).unwrap_err();
        assert_eq!(err.to_string(), "ERR_FIND_MIT");
    }

    #[test]
    fn mit_transfer_carries_content_and_funds_fee_separately() {
        let pool = vec![
            mit_utxo("m1", "owner", "BADGE", "hello"),
            etp_utxo("fee", "fee-wallet", 1_000_000),
        ];
        let builder = TxBuilder::new(&pool, 100);

        let draft = builder
            .transfer_mit(TransferMitParams {
                symbol: "BADGE".into(),
                recipient: "new-owner".into(),
                fee_address: Some("fee-wallet".into()),
                change_address: None,
                fee: None,
            })
            .unwrap();

        assert_eq!(draft.inputs[0].previous_output.hash, "m1");
        assert_eq!(draft.inputs[1].previous_output.hash, "fee");
        let mit_output = &draft.outputs[0];
        assert_eq!(mit_output.address, "new-owner");
        assert!(matches!(
            &mit_output.attachment,
            DraftAttachment::Ledger(Attachment::Mit { content, .. }) if content == "hello"
        ));
    }

    #[test]
    fn avatar_bounty_comes_out_of_the_registration_fee() {
        let pool = vec![etp_utxo("a", "me", 200_000_000)];
        let builder = TxBuilder::new(&pool, 100);

        let draft = builder
            .register_avatar(RegisterAvatarParams {
                symbol: "alice".into(),
                address: "me".into(),
                bounty: Some(("bounty-pool".into(), 20_000_000)),
                from: None,
                change_address: None,
            })
            .unwrap();

        assert!(
            draft
                .outputs
                .iter()
                .any(|o| o.address == "bounty-pool" && o.value == 20_000_000)
        );
        // Total spend is the registration fee regardless of the bounty split.
        let change = draft.outputs.last().unwrap();
        assert_eq!(change.value, 200_000_000 - AVATAR_REGISTER_FEE);
    }

    struct NoopSigner;

    #[async_trait]
    impl Signer for NoopSigner {
        async fn sign(&self, draft: &TxDraft) -> Result<SignedTransaction, WalletError> {
            let record = TransactionRecord {
                hash: String::new(),
                height: 0,
                inputs: draft
                    .inputs
                    .iter()
                    .map(|input| TxInput {
                        previous_output: input.previous_output.clone(),
                    })
                    .collect(),
                outputs: draft
                    .outputs
                    .iter()
                    .filter_map(|output| match &output.attachment {
                        DraftAttachment::Ledger(attachment) => Some(TxOutput {
                            address: output.address.clone(),
                            value: output.value,
                            attachment: attachment.clone(),
                            locked_height_range: output.locked_height_range,
                            attenuation: None,
                        }),
                        DraftAttachment::AvatarRegister { .. } => None,
                    })
                    .collect(),
            };
            Ok(SignedTransaction {
                raw: "00".to_string(),
                record,
            })
        }

        async fn sign_multisig(
            &self,
            draft: &TxDraft,
            _params: &MultisigParams,
        ) -> Result<SignedTransaction, WalletError> {
            self.sign(draft).await
        }
    }

    #[tokio::test]
    async fn multisig_send_goes_through_the_multisig_signer() {
        let pool = vec![etp_utxo("a", "3multisig", 1_000_000)];
        let builder = TxBuilder::new(&pool, 100);
        let multisig = MultisigParams {
            required: 2,
            public_keys: vec!["pk1".into(), "pk2".into(), "pk3".into()],
        };

        let signed = builder
            .send_multisig(send_params("dest", 100_000), &multisig, &NoopSigner)
            .await
            .unwrap();
        // Change returns to the multisig address itself.
        assert_eq!(signed.record.outputs[1].address, "3multisig");
    }

    #[tokio::test]
    async fn signing_seam_produces_a_local_record() {
        let pool = vec![etp_utxo("a", "sender", 1_000_000)];
        let builder = TxBuilder::new(&pool, 100);
        let draft = builder.send(send_params("dest", 100_000)).unwrap();

        let signed = NoopSigner.sign(&draft).await.unwrap();
        assert_eq!(signed.record.inputs.len(), 1);
        assert_eq!(signed.record.outputs.len(), 2);
        assert!(!signed.record.is_confirmed());
    }
}
