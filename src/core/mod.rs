//! Core ledger components
//!
//! This module contains the building blocks programs run against:
//! - Transactions and atomic transaction groups
//! - Application state (global and per-account local stores) with schemas
//!   and write-buffering views

pub mod state;
pub mod transaction;

pub use state::{
    readable_bytes, AppState, KeyValueStore, StateDelta, StateError, StateSchema, StateValue,
    StateView, ValueType, DEFAULT_SCHEMA_BYTES, DEFAULT_SCHEMA_INTS,
};
pub use transaction::{
    Address, OnComplete, Transaction, TransactionError, TransactionGroup, TxnKind, TxnType,
    ADDRESS_LEN, DEFAULT_VALIDITY_WINDOW, MAX_GROUP_SIZE, MIN_TXN_FEE,
};
