//! Core types for the ledger
//!
//! All types are designed for:
//! - Reproducible hashing (canonical JSON, sorted keys)
//! - Compact persistence (bincode)
//! - Exact arithmetic (integer base units for money)

use crate::{
    amount::{self, AmountInput},
    crypto::canonical_digest,
    Error, Result,
};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender of system-issued transfers (mining rewards, genesis allocations)
pub const SYSTEM_SENDER: &str = "Sistema";

/// `previous_hash` of block 0
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Canonical form of an address; identity is case-insensitive
pub fn normalize_address(address: &str) -> String {
    address.to_lowercase()
}

/// Case-insensitive address comparison
pub fn same_address(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Current UTC time at the precision timestamps are hashed with
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// RFC 3339 rendering used inside hashes and views
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Value transfer between two addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sending address, or [`SYSTEM_SENDER`]
    pub sender: String,
    /// Receiving address
    pub recipient: String,
    /// Amount in base units
    #[serde(with = "amount::base_units_str")]
    pub amount: u128,
    /// Creation time (microsecond precision)
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct TransactionHashInput<'a> {
    amount: String,
    recipient: &'a str,
    sender: &'a str,
    timestamp: String,
}

/// Serialized view of a transaction (the form embedded in block hashes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    /// Base units as an exact integer string
    pub amount: String,
    /// Display amount
    pub amount_formatted: String,
    /// Transaction hash
    pub hash: String,
    /// Receiving address
    pub recipient: String,
    /// Sending address
    pub sender: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl Transaction {
    /// New transfer stamped with the current time
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u128) -> Self {
        Self::with_timestamp(sender, recipient, amount, now())
    }

    /// New transfer with an explicit timestamp (truncated to microseconds)
    pub fn with_timestamp(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u128,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            timestamp: timestamp.trunc_subsecs(6),
        }
    }

    /// New transfer from caller-supplied amount input.
    ///
    /// The amount goes through [`amount::parse_amount`]; a negative result
    /// is a validation error.
    pub fn parse(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<AmountInput>,
    ) -> Result<Self> {
        let base_units = amount::parse_amount(amount)?;
        let amount = u128::try_from(base_units)
            .map_err(|_| Error::Validation(format!("amount must not be negative: {}", base_units)))?;
        Ok(Self::new(sender, recipient, amount))
    }

    /// System-issued credit to `recipient`
    pub fn system(recipient: impl Into<String>, amount: u128) -> Self {
        Self::new(SYSTEM_SENDER, recipient, amount)
    }

    /// Whether this transfer was issued by the system
    pub fn is_system(&self) -> bool {
        same_address(&self.sender, SYSTEM_SENDER)
    }

    /// Whether `address` is the sender or the recipient
    pub fn involves(&self, address: &str) -> bool {
        same_address(&self.sender, address) || same_address(&self.recipient, address)
    }

    /// Amount as signed base units
    pub fn signed_amount(&self) -> i128 {
        i128::try_from(self.amount).unwrap_or(i128::MAX)
    }

    /// SHA-256 of `{amount, recipient, sender, timestamp}`
    pub fn calculate_hash(&self) -> String {
        canonical_digest(&TransactionHashInput {
            amount: self.amount.to_string(),
            recipient: &self.recipient,
            sender: &self.sender,
            timestamp: format_timestamp(&self.timestamp),
        })
    }

    /// Serialized view including hash and formatted amount
    pub fn to_view(&self) -> TransactionView {
        TransactionView {
            amount: self.amount.to_string(),
            amount_formatted: amount::format(self.signed_amount()),
            hash: self.calculate_hash(),
            recipient: self.recipient.clone(),
            sender: self.sender.clone(),
            timestamp: format_timestamp(&self.timestamp),
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {}",
            self.sender,
            self.recipient,
            amount::format(self.signed_amount())
        )
    }
}

/// Block of transactions sealed by proof-of-work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (genesis = 0)
    pub index: u64,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Ordered transactions
    pub transactions: Vec<Transaction>,
    /// Hash of the preceding block (`"0"` for genesis)
    pub previous_hash: String,
    /// Digest of the current contents
    pub hash: String,
    /// Proof-of-work counter
    pub nonce: u64,
}

#[derive(Serialize)]
struct BlockHashInput<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: String,
    transactions: &'a [TransactionView],
}

/// Serialized view of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockView {
    /// Block hash
    pub hash: String,
    /// Position in the chain
    pub index: u64,
    /// Proof-of-work counter
    pub nonce: u64,
    /// Hash of the preceding block
    pub previous_hash: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
    /// Transaction views in block order
    pub transactions: Vec<TransactionView>,
}

impl Block {
    /// Unsealed candidate: empty hash, nonce 0, current time
    pub fn new(index: u64, previous_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        Self {
            index,
            timestamp: now(),
            transactions,
            previous_hash: previous_hash.into(),
            hash: String::new(),
            nonce: 0,
        }
    }

    /// Genesis block at `timestamp`, hash computed
    pub fn genesis(transactions: Vec<Transaction>, timestamp: DateTime<Utc>) -> Self {
        let mut block = Self::new(0, GENESIS_PREVIOUS_HASH, transactions);
        block.timestamp = timestamp.trunc_subsecs(6);
        block.rehash();
        block
    }

    /// SHA-256 of `{index, nonce, previous_hash, timestamp, transactions}`
    pub fn calculate_hash(&self) -> String {
        let views: Vec<TransactionView> = self.transactions.iter().map(Transaction::to_view).collect();
        self.hash_with_views(&views)
    }

    /// Block hash given precomputed transaction views.
    ///
    /// The nonce loop only changes `nonce`, so the views are built once.
    pub(crate) fn hash_with_views(&self, views: &[TransactionView]) -> String {
        canonical_digest(&BlockHashInput {
            index: self.index,
            nonce: self.nonce,
            previous_hash: &self.previous_hash,
            timestamp: format_timestamp(&self.timestamp),
            transactions: views,
        })
    }

    /// Recompute `hash` from the current contents
    pub fn rehash(&mut self) {
        self.hash = self.calculate_hash();
    }

    /// Whether the stored hash matches the contents
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Serialized view
    pub fn to_view(&self) -> BlockView {
        BlockView {
            hash: self.hash.clone(),
            index: self.index,
            nonce: self.nonce,
            previous_hash: self.previous_hash.clone(),
            timestamp: format_timestamp(&self.timestamp),
            transactions: self.transactions.iter().map(Transaction::to_view).collect(),
        }
    }
}

/// In-process copy of the confirmed chain
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chain {
    /// Blocks 0..N-1
    pub blocks: Vec<Block>,
    /// Required leading zero hex digits
    pub difficulty: u32,
    /// Reward per mined block, in base units
    pub mining_reward: u128,
}

impl Chain {
    /// Empty chain with the given parameters
    pub fn new(difficulty: u32, mining_reward: u128) -> Self {
        Self {
            blocks: Vec::new(),
            difficulty,
            mining_reward,
        }
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// No blocks yet (genesis not created)
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Last block, if any
    pub fn latest(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Length and tip hash
    pub fn summary(&self) -> Option<ChainSummary> {
        self.latest().map(|tip| ChainSummary {
            chain_length: self.blocks.len() as u64,
            latest_hash: tip.hash.clone(),
        })
    }
}

/// Cached `{chain_length, latest_hash}` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSummary {
    /// Number of blocks
    pub chain_length: u64,
    /// Hash of the last block
    pub latest_hash: String,
}

/// Chain status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Number of blocks
    pub length: u64,
    /// Required leading zero hex digits
    pub difficulty: u32,
    /// Reward per block in base units
    #[serde(with = "amount::base_units_str")]
    pub mining_reward: u128,
    /// Reward per block for display
    pub mining_reward_formatted: String,
    /// Transactions waiting to be mined
    pub pending_transactions: usize,
    /// Linkage and hashes verified
    pub is_valid: bool,
}

/// Side of a transfer from the queried address' point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Address was the sender
    Sent,
    /// Address was the recipient
    Received,
}

/// One confirmed transfer touching an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Index of the containing block
    pub block_index: u64,
    /// Hash of the containing block
    pub block_hash: String,
    /// Sent or received
    pub direction: Direction,
    /// The transfer itself
    pub transaction: Transaction,
}
