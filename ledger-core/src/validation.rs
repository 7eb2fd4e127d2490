//! Chain integrity checks
//!
//! A chain is valid when every block after genesis carries the digest of its
//! own contents and links to its predecessor's hash. Historical difficulty
//! is not re-checked.

use crate::types::Block;
use tracing::warn;

/// First integrity violation found in a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Stored hash differs from the recomputed digest
    HashMismatch {
        /// Offending block
        index: u64,
    },
    /// `previous_hash` does not match the predecessor
    BrokenLink {
        /// Offending block
        index: u64,
    },
}

/// Locate the first violation, if any
pub fn find_violation(chain: &[Block]) -> Option<Violation> {
    chain.windows(2).find_map(|pair| {
        let (previous, current) = (&pair[0], &pair[1]);
        if !current.has_valid_hash() {
            Some(Violation::HashMismatch {
                index: current.index,
            })
        } else if current.previous_hash != previous.hash {
            Some(Violation::BrokenLink {
                index: current.index,
            })
        } else {
            None
        }
    })
}

/// Linkage and recomputed hashes hold for blocks 1..N
pub fn is_chain_valid(chain: &[Block]) -> bool {
    match find_violation(chain) {
        None => true,
        Some(violation) => {
            warn!(?violation, "Chain integrity check failed");
            false
        }
    }
}
