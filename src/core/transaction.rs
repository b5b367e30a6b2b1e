//! Transaction context model
//!
//! Transactions, their types and on-completion actions, and the atomic
//! group a program executes inside of. Programs only ever read this data;
//! a group exists for the duration of one atomic execution.

use crate::crypto::tagged_sha256;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of transactions in one atomic group
pub const MAX_GROUP_SIZE: usize = 16;

/// Minimum fee per transaction (in base units)
pub const MIN_TXN_FEE: u64 = 1000;

/// Default number of rounds a transaction stays valid for
pub const DEFAULT_VALIDITY_WINDOW: u64 = 1000;

/// Length of an account address in bytes
pub const ADDRESS_LEN: usize = 32;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Transaction group is empty")]
    EmptyGroup,
    #[error("Transaction group too large: {0} (max: {1})")]
    GroupTooLarge(usize, usize),
    #[error("Group index {0} out of range for group of {1}")]
    IndexOutOfRange(usize, usize),
}

// =============================================================================
// Address
// =============================================================================

/// A 32-byte account address
///
/// Serialized as lowercase hex. When deserializing, anything that is not a
/// 64-character hex string is treated as a label and hashed into an address,
/// which keeps hand-written scenario files readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Wrap raw address bytes
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// The all-zero address
    pub const fn zero() -> Self {
        Self([0u8; ADDRESS_LEN])
    }

    /// Derive a deterministic address from a human-readable label
    pub fn derive(label: &str) -> Self {
        Self(tagged_sha256(b"ADDR", label.as_bytes()))
    }

    /// Build an address from a byte slice of exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; ADDRESS_LEN] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    /// Raw address bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Shortened hex form for display
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = TransactionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TransactionError::InvalidAddress(value));
        }
        if trimmed.len() == ADDRESS_LEN * 2 {
            if let Ok(bytes) = hex::decode(trimmed) {
                if let Some(address) = Address::from_slice(&bytes) {
                    return Ok(address);
                }
            }
        }
        Ok(Address::derive(trimmed))
    }
}

// =============================================================================
// Transaction Types
// =============================================================================

/// Transaction type, as exposed to programs through `TypeEnum`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnType {
    #[serde(rename = "pay")]
    Payment = 1,
    #[serde(rename = "keyreg")]
    KeyRegistration = 2,
    #[serde(rename = "acfg")]
    AssetConfig = 3,
    #[serde(rename = "axfer")]
    AssetTransfer = 4,
    #[serde(rename = "afrz")]
    AssetFreeze = 5,
    #[serde(rename = "appl")]
    ApplicationCall = 6,
}

impl TxnType {
    pub const ALL: [TxnType; 6] = [
        TxnType::Payment,
        TxnType::KeyRegistration,
        TxnType::AssetConfig,
        TxnType::AssetTransfer,
        TxnType::AssetFreeze,
        TxnType::ApplicationCall,
    ];

    /// Numeric code pushed by `TypeEnum`
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Short name, used both for the `Type` field and for named constants
    pub fn name(self) -> &'static str {
        match self {
            TxnType::Payment => "pay",
            TxnType::KeyRegistration => "keyreg",
            TxnType::AssetConfig => "acfg",
            TxnType::AssetTransfer => "axfer",
            TxnType::AssetFreeze => "afrz",
            TxnType::ApplicationCall => "appl",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// Action an application call requests after the approval program runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnComplete {
    #[default]
    NoOp = 0,
    OptIn = 1,
    CloseOut = 2,
    ClearState = 3,
    UpdateApplication = 4,
    DeleteApplication = 5,
}

impl OnComplete {
    pub const ALL: [OnComplete; 6] = [
        OnComplete::NoOp,
        OnComplete::OptIn,
        OnComplete::CloseOut,
        OnComplete::ClearState,
        OnComplete::UpdateApplication,
        OnComplete::DeleteApplication,
    ];

    pub fn code(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            OnComplete::NoOp => "NoOp",
            OnComplete::OptIn => "OptIn",
            OnComplete::CloseOut => "CloseOut",
            OnComplete::ClearState => "ClearState",
            OnComplete::UpdateApplication => "UpdateApplication",
            OnComplete::DeleteApplication => "DeleteApplication",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Type-specific part of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxnKind {
    Payment {
        receiver: Address,
        amount: u64,
        #[serde(default)]
        close_remainder_to: Option<Address>,
    },
    KeyRegistration,
    AssetConfig {
        #[serde(default)]
        asset_id: u64,
    },
    AssetTransfer {
        asset_id: u64,
        receiver: Address,
        amount: u64,
    },
    AssetFreeze {
        asset_id: u64,
        target: Address,
        frozen: bool,
    },
    ApplicationCall {
        #[serde(default)]
        app_id: u64,
        #[serde(default)]
        on_completion: OnComplete,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        accounts: Vec<Address>,
    },
}

// =============================================================================
// Transaction
// =============================================================================

fn default_fee() -> u64 {
    MIN_TXN_FEE
}

fn default_last_valid() -> u64 {
    DEFAULT_VALIDITY_WINDOW
}

/// A single transaction as seen by a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account that sent (and pays for) this transaction
    pub sender: Address,
    #[serde(default = "default_fee")]
    pub fee: u64,
    #[serde(default)]
    pub first_valid: u64,
    #[serde(default = "default_last_valid")]
    pub last_valid: u64,
    #[serde(default)]
    pub note: String,
    #[serde(flatten)]
    pub kind: TxnKind,
}

impl Transaction {
    fn with_kind(sender: Address, kind: TxnKind) -> Self {
        Self {
            sender,
            fee: MIN_TXN_FEE,
            first_valid: 0,
            last_valid: DEFAULT_VALIDITY_WINDOW,
            note: String::new(),
            kind,
        }
    }

    /// Create a payment transaction
    pub fn payment(sender: Address, receiver: Address, amount: u64) -> Self {
        Self::with_kind(
            sender,
            TxnKind::Payment {
                receiver,
                amount,
                close_remainder_to: None,
            },
        )
    }

    /// Create an application call transaction
    pub fn app_call(sender: Address, app_id: u64, on_completion: OnComplete) -> Self {
        Self::with_kind(
            sender,
            TxnKind::ApplicationCall {
                app_id,
                on_completion,
                args: Vec::new(),
                accounts: Vec::new(),
            },
        )
    }

    /// Create an application creation call (app id 0)
    pub fn app_create(sender: Address) -> Self {
        Self::app_call(sender, 0, OnComplete::NoOp)
    }

    /// Create a key registration transaction
    pub fn key_registration(sender: Address) -> Self {
        Self::with_kind(sender, TxnKind::KeyRegistration)
    }

    /// Create an asset transfer transaction
    pub fn asset_transfer(sender: Address, receiver: Address, asset_id: u64, amount: u64) -> Self {
        Self::with_kind(
            sender,
            TxnKind::AssetTransfer {
                asset_id,
                receiver,
                amount,
            },
        )
    }

    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_validity(mut self, first_valid: u64, last_valid: u64) -> Self {
        self.first_valid = first_valid;
        self.last_valid = last_valid;
        self
    }

    /// Set the foreign accounts of an application call (ignored for other kinds)
    pub fn with_accounts(mut self, extra: Vec<Address>) -> Self {
        if let TxnKind::ApplicationCall { accounts, .. } = &mut self.kind {
            *accounts = extra;
        }
        self
    }

    /// Set the arguments of an application call (ignored for other kinds)
    pub fn with_args(mut self, new_args: Vec<String>) -> Self {
        if let TxnKind::ApplicationCall { args, .. } = &mut self.kind {
            *args = new_args;
        }
        self
    }

    /// Type of this transaction
    pub fn txn_type(&self) -> TxnType {
        match self.kind {
            TxnKind::Payment { .. } => TxnType::Payment,
            TxnKind::KeyRegistration => TxnType::KeyRegistration,
            TxnKind::AssetConfig { .. } => TxnType::AssetConfig,
            TxnKind::AssetTransfer { .. } => TxnType::AssetTransfer,
            TxnKind::AssetFreeze { .. } => TxnType::AssetFreeze,
            TxnKind::ApplicationCall { .. } => TxnType::ApplicationCall,
        }
    }

    /// Application id for application calls
    pub fn app_id(&self) -> Option<u64> {
        match self.kind {
            TxnKind::ApplicationCall { app_id, .. } => Some(app_id),
            _ => None,
        }
    }

    /// On-completion action for application calls
    pub fn on_completion(&self) -> Option<OnComplete> {
        match self.kind {
            TxnKind::ApplicationCall { on_completion, .. } => Some(on_completion),
            _ => None,
        }
    }

    /// Accounts a program may write local state for: the sender, then any
    /// foreign accounts listed on an application call
    pub fn accessible_accounts(&self) -> Vec<Address> {
        let mut accounts = vec![self.sender];
        if let TxnKind::ApplicationCall { accounts: extra, .. } = &self.kind {
            accounts.extend(extra.iter().copied());
        }
        accounts
    }

    /// Resolve an account reference by index: 0 is the sender, `i` is the
    /// `i-1`th foreign account
    pub fn account_at(&self, index: u64) -> Option<Address> {
        let index = usize::try_from(index).ok()?;
        self.accessible_accounts().get(index).copied()
    }

    /// Canonical byte encoding used for hashing
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        put_bytes(&mut out, self.txn_type().name().as_bytes());
        put_bytes(&mut out, self.sender.as_bytes());
        put_u64(&mut out, self.fee);
        put_u64(&mut out, self.first_valid);
        put_u64(&mut out, self.last_valid);
        put_bytes(&mut out, self.note.as_bytes());

        match &self.kind {
            TxnKind::Payment {
                receiver,
                amount,
                close_remainder_to,
            } => {
                put_bytes(&mut out, receiver.as_bytes());
                put_u64(&mut out, *amount);
                match close_remainder_to {
                    Some(to) => put_bytes(&mut out, to.as_bytes()),
                    None => put_bytes(&mut out, &[]),
                }
            }
            TxnKind::KeyRegistration => {}
            TxnKind::AssetConfig { asset_id } => put_u64(&mut out, *asset_id),
            TxnKind::AssetTransfer {
                asset_id,
                receiver,
                amount,
            } => {
                put_u64(&mut out, *asset_id);
                put_bytes(&mut out, receiver.as_bytes());
                put_u64(&mut out, *amount);
            }
            TxnKind::AssetFreeze {
                asset_id,
                target,
                frozen,
            } => {
                put_u64(&mut out, *asset_id);
                put_bytes(&mut out, target.as_bytes());
                out.push(u8::from(*frozen));
            }
            TxnKind::ApplicationCall {
                app_id,
                on_completion,
                args,
                accounts,
            } => {
                put_u64(&mut out, *app_id);
                put_u64(&mut out, on_completion.code());
                put_u64(&mut out, args.len() as u64);
                for arg in args {
                    put_bytes(&mut out, arg.as_bytes());
                }
                put_u64(&mut out, accounts.len() as u64);
                for account in accounts {
                    put_bytes(&mut out, account.as_bytes());
                }
            }
        }

        out
    }

    /// Transaction id: SHA-256 over the canonical encoding
    pub fn tx_id(&self) -> [u8; 32] {
        tagged_sha256(b"TX", &self.encode())
    }

    /// Transaction id as hex
    pub fn tx_id_hex(&self) -> String {
        hex::encode(self.tx_id())
    }
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

// =============================================================================
// Transaction Group
// =============================================================================

/// Ordered, atomically committed batch of transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionGroup {
    txns: Vec<Transaction>,
}

impl TransactionGroup {
    /// Create a group, enforcing `1..=MAX_GROUP_SIZE` members
    pub fn new(txns: Vec<Transaction>) -> Result<Self, TransactionError> {
        if txns.is_empty() {
            return Err(TransactionError::EmptyGroup);
        }
        if txns.len() > MAX_GROUP_SIZE {
            return Err(TransactionError::GroupTooLarge(txns.len(), MAX_GROUP_SIZE));
        }
        Ok(Self { txns })
    }

    /// A group holding exactly one transaction
    pub fn single(txn: Transaction) -> Self {
        Self { txns: vec![txn] }
    }

    pub fn len(&self) -> usize {
        self.txns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Transaction> {
        self.txns.get(index)
    }

    /// Get a member, failing if the index is outside the group
    pub fn member(&self, index: usize) -> Result<&Transaction, TransactionError> {
        self.txns
            .get(index)
            .ok_or(TransactionError::IndexOutOfRange(index, self.txns.len()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.txns.iter()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.txns
    }

    /// Group id: SHA-256 over the concatenated member transaction ids
    pub fn group_id(&self) -> [u8; 32] {
        let mut ids = Vec::with_capacity(self.txns.len() * 32);
        for txn in &self.txns {
            ids.extend_from_slice(&txn.tx_id());
        }
        tagged_sha256(b"TG", &ids)
    }
}
