//! Cryptographic utilities
//!
//! This module provides SHA-256 hashing for transaction ids, group ids and
//! deterministic address derivation.

pub mod hash;

pub use hash::{sha256, sha256_array, sha256_hex, tagged_sha256};
