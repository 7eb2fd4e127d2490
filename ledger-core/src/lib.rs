//! Ledger Core
//!
//! Centralized proof-of-work ledger: transfers are accepted into a pending
//! pool, sealed into hash-linked blocks and persisted in RocksDB.
//!
//! # Architecture
//!
//! - **Durable store**: RocksDB holds the confirmed chain and is the source of truth
//! - **Volatile store**: Redis (or memory) mirrors the pending pool with an expiry
//! - **Event channel**: Transfers and blocks are announced on the message bus
//! - **Single miner**: One nonce search at a time, off the async runtime
//!
//! # Invariants
//!
//! - Block `i` links to the hash of block `i - 1`
//! - Every stored hash matches its recomputed digest
//! - Balances are derived from the chain, never stored
//! - Genesis is created once, on an empty store

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod amount;
pub mod balance;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod genesis;
pub mod ledger;
pub mod metrics;
pub mod mining;
pub mod pending;
pub mod report;
pub mod storage;
pub mod tasks;
pub mod types;
pub mod validation;

// Re-exports
pub use amount::AmountInput;
pub use config::Config;
pub use error::{Error, Result};
pub use genesis::{GenesisAllocation, GenesisManifest};
pub use ledger::{AddressPolicy, AnyAddress, EvmAddress, Ledger, SubmitReceipt, TransferRequest};
pub use mining::MiningOutcome;
pub use report::FinancialReport;
pub use types::{
    Block, BlockView, Chain, ChainInfo, ChainSummary, Direction, HistoryEntry, Transaction,
    TransactionView, SYSTEM_SENDER,
};
