//! Transaction and global fields readable by programs
//!
//! Each field knows its assembly name, the type it pushes, the first program
//! version it is available in and which transaction types carry it.

use crate::core::state::ValueType;
use crate::core::transaction::TxnType;

/// Field of a transaction, read with `txn F` / `gtxn i F`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnField {
    Sender,
    Fee,
    FirstValid,
    LastValid,
    Note,
    Receiver,
    Amount,
    CloseRemainderTo,
    TypeEnum,
    Type,
    GroupIndex,
    TxId,
    ApplicationId,
    OnCompletion,
    NumAppArgs,
    NumAccounts,
    XferAsset,
    AssetAmount,
    AssetReceiver,
}

impl TxnField {
    pub const ALL: [TxnField; 19] = [
        TxnField::Sender,
        TxnField::Fee,
        TxnField::FirstValid,
        TxnField::LastValid,
        TxnField::Note,
        TxnField::Receiver,
        TxnField::Amount,
        TxnField::CloseRemainderTo,
        TxnField::TypeEnum,
        TxnField::Type,
        TxnField::GroupIndex,
        TxnField::TxId,
        TxnField::ApplicationId,
        TxnField::OnCompletion,
        TxnField::NumAppArgs,
        TxnField::NumAccounts,
        TxnField::XferAsset,
        TxnField::AssetAmount,
        TxnField::AssetReceiver,
    ];

    /// Name used in the listing
    pub fn name(self) -> &'static str {
        match self {
            TxnField::Sender => "Sender",
            TxnField::Fee => "Fee",
            TxnField::FirstValid => "FirstValid",
            TxnField::LastValid => "LastValid",
            TxnField::Note => "Note",
            TxnField::Receiver => "Receiver",
            TxnField::Amount => "Amount",
            TxnField::CloseRemainderTo => "CloseRemainderTo",
            TxnField::TypeEnum => "TypeEnum",
            TxnField::Type => "Type",
            TxnField::GroupIndex => "GroupIndex",
            TxnField::TxId => "TxID",
            TxnField::ApplicationId => "ApplicationID",
            TxnField::OnCompletion => "OnCompletion",
            TxnField::NumAppArgs => "NumAppArgs",
            TxnField::NumAccounts => "NumAccounts",
            TxnField::XferAsset => "XferAsset",
            TxnField::AssetAmount => "AssetAmount",
            TxnField::AssetReceiver => "AssetReceiver",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Type of the value pushed for this field
    pub fn value_type(self) -> ValueType {
        match self {
            TxnField::Sender
            | TxnField::Note
            | TxnField::Receiver
            | TxnField::CloseRemainderTo
            | TxnField::Type
            | TxnField::TxId
            | TxnField::AssetReceiver => ValueType::Bytes,
            TxnField::Fee
            | TxnField::FirstValid
            | TxnField::LastValid
            | TxnField::Amount
            | TxnField::TypeEnum
            | TxnField::GroupIndex
            | TxnField::ApplicationId
            | TxnField::OnCompletion
            | TxnField::NumAppArgs
            | TxnField::NumAccounts
            | TxnField::XferAsset
            | TxnField::AssetAmount => ValueType::Int,
        }
    }

    /// First program version that can read this field
    pub fn min_version(self) -> u8 {
        match self {
            TxnField::ApplicationId
            | TxnField::OnCompletion
            | TxnField::NumAppArgs
            | TxnField::NumAccounts => 2,
            _ => 1,
        }
    }

    /// Whether a transaction of the given type carries this field.
    /// Reading a field a transaction does not carry is a runtime failure.
    pub fn applies_to(self, txn_type: TxnType) -> bool {
        match self {
            TxnField::Receiver | TxnField::Amount | TxnField::CloseRemainderTo => {
                txn_type == TxnType::Payment
            }
            TxnField::ApplicationId
            | TxnField::OnCompletion
            | TxnField::NumAppArgs
            | TxnField::NumAccounts => txn_type == TxnType::ApplicationCall,
            TxnField::XferAsset | TxnField::AssetAmount | TxnField::AssetReceiver => {
                txn_type == TxnType::AssetTransfer
            }
            _ => true,
        }
    }
}

/// Ledger-wide field, read with `global F`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalField {
    MinTxnFee,
    ZeroAddress,
    GroupSize,
    Round,
    LatestTimestamp,
    CurrentApplicationId,
    CreatorAddress,
}

impl GlobalField {
    pub const ALL: [GlobalField; 7] = [
        GlobalField::MinTxnFee,
        GlobalField::ZeroAddress,
        GlobalField::GroupSize,
        GlobalField::Round,
        GlobalField::LatestTimestamp,
        GlobalField::CurrentApplicationId,
        GlobalField::CreatorAddress,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GlobalField::MinTxnFee => "MinTxnFee",
            GlobalField::ZeroAddress => "ZeroAddress",
            GlobalField::GroupSize => "GroupSize",
            GlobalField::Round => "Round",
            GlobalField::LatestTimestamp => "LatestTimestamp",
            GlobalField::CurrentApplicationId => "CurrentApplicationID",
            GlobalField::CreatorAddress => "CreatorAddress",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn value_type(self) -> ValueType {
        match self {
            GlobalField::ZeroAddress | GlobalField::CreatorAddress => ValueType::Bytes,
            _ => ValueType::Int,
        }
    }

    pub fn min_version(self) -> u8 {
        match self {
            GlobalField::MinTxnFee | GlobalField::ZeroAddress | GlobalField::GroupSize => 1,
            GlobalField::Round
            | GlobalField::LatestTimestamp
            | GlobalField::CurrentApplicationId => 2,
            GlobalField::CreatorAddress => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_unique_and_parse_back() {
        for field in TxnField::ALL {
            assert_eq!(TxnField::from_name(field.name()), Some(field));
        }
        for field in GlobalField::ALL {
            assert_eq!(GlobalField::from_name(field.name()), Some(field));
        }
        assert_eq!(TxnField::from_name("TxId"), None);
    }

    #[test]
    fn test_amount_only_on_payments() {
        assert!(TxnField::Amount.applies_to(TxnType::Payment));
        assert!(!TxnField::Amount.applies_to(TxnType::ApplicationCall));
        assert!(TxnField::Sender.applies_to(TxnType::AssetFreeze));
        assert!(TxnField::ApplicationId.applies_to(TxnType::ApplicationCall));
        assert!(!TxnField::ApplicationId.applies_to(TxnType::Payment));
    }

    #[test]
    fn test_versions() {
        assert_eq!(TxnField::Sender.min_version(), 1);
        assert_eq!(TxnField::ApplicationId.min_version(), 2);
        assert_eq!(GlobalField::Round.min_version(), 2);
        assert_eq!(GlobalField::CreatorAddress.min_version(), 3);
        assert_eq!(GlobalField::ZeroAddress.value_type(), ValueType::Bytes);
    }
}
