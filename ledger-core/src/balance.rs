//! Balances and transaction history
//!
//! Both are derived by replaying every confirmed transaction. There is no
//! balance index, so each call costs O(total transactions).

use crate::types::{same_address, Block, Direction, HistoryEntry};

/// Net base units for `address`: credits minus debits, not clamped at zero
pub fn balance_of(chain: &[Block], address: &str) -> i128 {
    chain
        .iter()
        .flat_map(|block| block.transactions.iter())
        .fold(0i128, |balance, tx| {
            let mut balance = balance;
            if same_address(&tx.sender, address) {
                balance = balance.saturating_sub(tx.signed_amount());
            }
            if same_address(&tx.recipient, address) {
                balance = balance.saturating_add(tx.signed_amount());
            }
            balance
        })
}

/// Every confirmed transfer touching `address`, oldest first.
///
/// A self-transfer yields a `sent` and a `received` entry.
pub fn history_of(chain: &[Block], address: &str) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();

    for block in chain {
        for tx in &block.transactions {
            if same_address(&tx.sender, address) {
                entries.push(HistoryEntry {
                    block_index: block.index,
                    block_hash: block.hash.clone(),
                    direction: Direction::Sent,
                    transaction: tx.clone(),
                });
            }
            if same_address(&tx.recipient, address) {
                entries.push(HistoryEntry {
                    block_index: block.index,
                    block_hash: block.hash.clone(),
                    direction: Direction::Received,
                    transaction: tx.clone(),
                });
            }
        }
    }

    entries
}
