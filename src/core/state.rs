//! Application state stores
//!
//! Global state is a key-value store scoped to one application; local state
//! is one key-value store per (application, account) pair. The stores are
//! owned by the runtime. Programs only describe reads and writes, which the
//! VM records in a [`StateDelta`] layered over the committed state and which
//! are applied only when the program approves.

use crate::core::transaction::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Default number of Int keys a store may hold
pub const DEFAULT_SCHEMA_INTS: u64 = 16;

/// Default number of Bytes keys a store may hold
pub const DEFAULT_SCHEMA_BYTES: u64 = 16;

// =============================================================================
// Errors
// =============================================================================

/// State access errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Schema violation for key {key}: stored {stored}, attempted {attempted}")]
    SchemaViolation {
        key: String,
        stored: ValueType,
        attempted: ValueType,
    },
    #[error("Schema full: no room for another {kind} key (limit {limit})")]
    SchemaFull { kind: ValueType, limit: u64 },
}

// =============================================================================
// Values
// =============================================================================

/// Type of a stored (or stack) value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Bytes,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int => write!(f, "uint64"),
            ValueType::Bytes => write!(f, "bytes"),
        }
    }
}

/// A value held in state or on the VM stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateValue {
    Int(u64),
    Bytes(Vec<u8>),
}

impl StateValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            StateValue::Int(_) => ValueType::Int,
            StateValue::Bytes(_) => ValueType::Bytes,
        }
    }

    /// Zero value of a type: 0 or empty bytes
    pub fn zero(kind: ValueType) -> Self {
        match kind {
            ValueType::Int => StateValue::Int(0),
            ValueType::Bytes => StateValue::Bytes(Vec::new()),
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            StateValue::Int(v) => Some(*v),
            StateValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StateValue::Int(_) => None,
            StateValue::Bytes(b) => Some(b),
        }
    }
}

impl From<u64> for StateValue {
    fn from(value: u64) -> Self {
        StateValue::Int(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Bytes(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for StateValue {
    fn from(value: Vec<u8>) -> Self {
        StateValue::Bytes(value)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Int(v) => write!(f, "{}", v),
            StateValue::Bytes(b) => write!(f, "{}", readable_bytes(b)),
        }
    }
}

/// Render bytes as a quoted string when printable, hex otherwise
pub fn readable_bytes(bytes: &[u8]) -> String {
    let printable = bytes
        .iter()
        .all(|b| (0x20..0x7f).contains(b) && *b != b'"' && *b != b'\\');
    if printable {
        format!("\"{}\"", String::from_utf8_lossy(bytes))
    } else {
        format!("0x{}", hex::encode(bytes))
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Capacity of a store, counted per value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSchema {
    pub ints: u64,
    pub bytes: u64,
}

impl Default for StateSchema {
    fn default() -> Self {
        Self {
            ints: DEFAULT_SCHEMA_INTS,
            bytes: DEFAULT_SCHEMA_BYTES,
        }
    }
}

impl StateSchema {
    pub fn new(ints: u64, bytes: u64) -> Self {
        Self { ints, bytes }
    }

    pub fn capacity(&self, kind: ValueType) -> u64 {
        match kind {
            ValueType::Int => self.ints,
            ValueType::Bytes => self.bytes,
        }
    }
}

// =============================================================================
// Key-value store
// =============================================================================

/// Byte-string keyed store; iteration order is the key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueStore {
    entries: BTreeMap<Vec<u8>, StateValue>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&StateValue> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: Vec<u8>, value: StateValue) {
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<StateValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &StateValue)> {
        self.entries.iter()
    }

    /// Number of keys holding a value of the given type
    pub fn count(&self, kind: ValueType) -> u64 {
        self.entries
            .values()
            .filter(|v| v.value_type() == kind)
            .count() as u64
    }
}

// =============================================================================
// Application state
// =============================================================================

/// Committed state of one application
#[derive(Debug, Clone, Default)]
pub struct AppState {
    global: KeyValueStore,
    local: BTreeMap<Address, KeyValueStore>,
    global_schema: StateSchema,
    local_schema: StateSchema,
}

impl AppState {
    pub fn new(global_schema: StateSchema, local_schema: StateSchema) -> Self {
        Self {
            global: KeyValueStore::new(),
            local: BTreeMap::new(),
            global_schema,
            local_schema,
        }
    }

    pub fn global(&self) -> &KeyValueStore {
        &self.global
    }

    pub fn local(&self, account: &Address) -> Option<&KeyValueStore> {
        self.local.get(account)
    }

    pub fn global_schema(&self) -> StateSchema {
        self.global_schema
    }

    pub fn local_schema(&self) -> StateSchema {
        self.local_schema
    }

    pub fn is_opted_in(&self, account: &Address) -> bool {
        self.local.contains_key(account)
    }

    /// Accounts holding local state, in address order
    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.local.keys()
    }

    /// Allocate an (empty) local store for an account
    pub fn opt_in(&mut self, account: Address) {
        self.local.entry(account).or_default();
    }

    /// Drop an account's local store
    pub fn close_out(&mut self, account: &Address) -> Option<KeyValueStore> {
        self.local.remove(account)
    }

    /// Apply an approved delta
    pub fn commit(&mut self, delta: StateDelta) {
        for (key, value) in delta.global {
            self.global.insert(key, value);
        }
        for ((account, key), value) in delta.local {
            self.local.entry(account).or_default().insert(key, value);
        }
    }
}

/// Writes recorded during one execution, not yet committed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub global: BTreeMap<Vec<u8>, StateValue>,
    pub local: BTreeMap<(Address, Vec<u8>), StateValue>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.local.is_empty()
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.local.len()
    }
}

/// Read-through view of committed state plus the pending delta
pub struct StateView<'a> {
    base: &'a AppState,
    delta: StateDelta,
}

impl<'a> StateView<'a> {
    pub fn new(base: &'a AppState) -> Self {
        Self {
            base,
            delta: StateDelta::default(),
        }
    }

    pub fn get_global(&self, key: &[u8]) -> Option<&StateValue> {
        self.delta
            .global
            .get(key)
            .or_else(|| self.base.global.get(key))
    }

    pub fn put_global(&mut self, key: &[u8], value: StateValue) -> Result<(), StateError> {
        let existing = self.get_global(key).map(StateValue::value_type);
        match existing {
            Some(stored) => check_type(key, stored, &value)?,
            None => {
                let kind = value.value_type();
                let pending_new = self
                    .delta
                    .global
                    .iter()
                    .filter(|(k, v)| v.value_type() == kind && !self.base.global.contains_key(k.as_slice()))
                    .count() as u64;
                let used = self.base.global.count(kind) + pending_new;
                let limit = self.base.global_schema.capacity(kind);
                if used >= limit {
                    return Err(StateError::SchemaFull { kind, limit });
                }
            }
        }
        self.delta.global.insert(key.to_vec(), value);
        Ok(())
    }

    pub fn get_local(&self, account: &Address, key: &[u8]) -> Option<&StateValue> {
        self.delta
            .local
            .get(&(*account, key.to_vec()))
            .or_else(|| self.base.local.get(account).and_then(|s| s.get(key)))
    }

    pub fn put_local(
        &mut self,
        account: &Address,
        key: &[u8],
        value: StateValue,
    ) -> Result<(), StateError> {
        let existing = self.get_local(account, key).map(StateValue::value_type);
        match existing {
            Some(stored) => check_type(key, stored, &value)?,
            None => {
                let kind = value.value_type();
                let base = self.base.local.get(account);
                let pending_new = self
                    .delta
                    .local
                    .iter()
                    .filter(|((a, k), v)| {
                        a == account
                            && v.value_type() == kind
                            && !base.map(|s| s.contains_key(k.as_slice())).unwrap_or(false)
                    })
                    .count() as u64;
                let used = base.map(|s| s.count(kind)).unwrap_or(0) + pending_new;
                let limit = self.base.local_schema.capacity(kind);
                if used >= limit {
                    return Err(StateError::SchemaFull { kind, limit });
                }
            }
        }
        self.delta.local.insert((*account, key.to_vec()), value);
        Ok(())
    }

    pub fn is_opted_in(&self, account: &Address) -> bool {
        self.base.is_opted_in(account)
    }

    pub fn delta(&self) -> &StateDelta {
        &self.delta
    }

    pub fn into_delta(self) -> StateDelta {
        self.delta
    }
}

fn check_type(key: &[u8], stored: ValueType, value: &StateValue) -> Result<(), StateError> {
    let attempted = value.value_type();
    if stored != attempted {
        return Err(StateError::SchemaViolation {
            key: readable_bytes(key),
            stored,
            attempted,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_bytes() {
        assert_eq!(readable_bytes(b"World!"), "\"World!\"");
        assert_eq!(readable_bytes(&[0, 255]), "0x00ff");
        assert_eq!(readable_bytes(b"a\"b"), "0x612262");
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(StateValue::zero(ValueType::Int), StateValue::Int(0));
        assert_eq!(StateValue::zero(ValueType::Bytes), StateValue::Bytes(Vec::new()));
        assert_eq!(StateValue::Int(7).as_int(), Some(7));
        assert_eq!(StateValue::from("x").as_int(), None);
    }

    #[test]
    fn test_view_reads_through_to_base() {
        let mut state = AppState::new(StateSchema::default(), StateSchema::default());
        let mut delta = StateDelta::default();
        delta.global.insert(b"Hello".to_vec(), "World!".into());
        state.commit(delta);

        let mut view = StateView::new(&state);
        assert_eq!(view.get_global(b"Hello"), Some(&"World!".into()));
        view.put_global(b"Hello", "There".into()).unwrap();
        assert_eq!(view.get_global(b"Hello"), Some(&"There".into()));

        // Base untouched until commit
        assert_eq!(state.global().get(b"Hello"), Some(&"World!".into()));
    }

    #[test]
    fn test_stored_type_is_fixed() {
        let state = AppState::new(StateSchema::new(1, 1), StateSchema::new(1, 1));
        let mut view = StateView::new(&state);
        view.put_global(b"count", 1.into()).unwrap();
        let err = view.put_global(b"count", "one".into()).unwrap_err();
        assert!(matches!(err, StateError::SchemaViolation { .. }));

        let empty = AppState::new(StateSchema::new(0, 0), StateSchema::new(0, 0));
        let mut view = StateView::new(&empty);
        assert!(matches!(
            view.put_global(b"k", 1.into()),
            Err(StateError::SchemaFull {
                kind: ValueType::Int,
                limit: 0
            })
        ));
    }

    #[test]
    fn test_schema_capacity_counts_pending_keys() {
        let state = AppState::new(StateSchema::new(1, 0), StateSchema::new(0, 1));
        let alice = Address::derive("alice");
        let mut view = StateView::new(&state);

        view.put_global(b"a", 1.into()).unwrap();
        view.put_global(b"a", 2.into()).unwrap();
        assert!(view.put_global(b"b", 3.into()).is_err());

        view.put_local(&alice, b"name", "alice".into()).unwrap();
        assert!(view.put_local(&alice, b"other", "x".into()).is_err());
        assert!(view.put_local(&alice, b"n", 1.into()).is_err());
        assert_eq!(view.delta().len(), 2);
    }

    #[test]
    fn test_commit_local_and_close_out() {
        let alice = Address::derive("alice");
        let mut state = AppState::new(StateSchema::default(), StateSchema::default());
        state.opt_in(alice);
        assert!(state.is_opted_in(&alice));

        let mut view = StateView::new(&state);
        view.put_local(&alice, b"localRound", 7.into()).unwrap();
        let delta = view.into_delta();
        state.commit(delta);

        assert_eq!(
            state.local(&alice).and_then(|s| s.get(b"localRound")),
            Some(&StateValue::Int(7))
        );
        assert!(state.close_out(&alice).is_some());
        assert!(!state.is_opted_in(&alice));
    }
}
