//! Hashing primitives
//!
//! Every ledger digest is SHA-256 over a canonical JSON encoding: compact
//! separators, keys in lexicographic order. The hash-input structs declare
//! their fields alphabetically so serde emits them already sorted.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 of raw bytes as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Canonical JSON bytes of a hash-input struct
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    // Hash inputs hold only strings and integers
    serde_json::to_vec(value).expect("canonical serialization cannot fail")
}

/// SHA-256 hex digest of the canonical JSON encoding of `value`
pub fn canonical_digest<T: Serialize>(value: &T) -> String {
    sha256_hex(&canonical_bytes(value))
}

/// Number of leading `'0'` hex characters in a digest
pub fn leading_zero_digits(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

/// Proof-of-work predicate: the first `difficulty` characters are `'0'`
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && leading_zero_digits(hash) >= difficulty
}
