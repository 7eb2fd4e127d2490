//! Proof-of-work mining
//!
//! Seals a block from the pending transactions by incrementing the nonce
//! until the hash has `difficulty` leading zero hex digits. The loop is
//! CPU-bound and never yields; async callers run it on the blocking pool.

use crate::{
    crypto::meets_difficulty,
    types::{Block, Transaction, TransactionView},
};
use tracing::debug;

/// Mining reward request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reward {
    /// Address credited by the system transfer
    pub address: String,
    /// Base units credited
    pub amount: u128,
}

/// Result of a mining attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningOutcome {
    /// Block sealed at the requested difficulty
    Sealed(Block),
    /// No transactions and no reward; the engine did nothing
    NothingToMine,
}

impl MiningOutcome {
    /// The sealed block, if any
    pub fn into_block(self) -> Option<Block> {
        match self {
            MiningOutcome::Sealed(block) => Some(block),
            MiningOutcome::NothingToMine => None,
        }
    }
}

/// Seal the next block.
///
/// `pending` is copied in order; the reward transfer, when requested, is
/// appended last. The transaction list is fixed before the nonce search
/// starts.
pub fn mine_block(
    pending: &[Transaction],
    reward: Option<Reward>,
    previous: &Block,
    difficulty: u32,
) -> MiningOutcome {
    let mut transactions = pending.to_vec();
    if let Some(reward) = reward {
        transactions.push(Transaction::system(reward.address, reward.amount));
    }

    if transactions.is_empty() {
        return MiningOutcome::NothingToMine;
    }

    let block = Block::new(previous.index + 1, previous.hash.clone(), transactions);
    MiningOutcome::Sealed(seal(block, difficulty))
}

/// Search nonces from the block's current value until the difficulty holds
pub fn seal(mut block: Block, difficulty: u32) -> Block {
    let views: Vec<TransactionView> = block.transactions.iter().map(Transaction::to_view).collect();

    block.hash = block.hash_with_views(&views);
    while !meets_difficulty(&block.hash, difficulty) {
        block.nonce = block.nonce.wrapping_add(1);
        block.hash = block.hash_with_views(&views);
    }

    debug!(
        block_index = block.index,
        nonce = block.nonce,
        hash = %block.hash,
        "Block sealed"
    );

    block
}
