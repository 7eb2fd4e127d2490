//! Type definitions for message bus

use serde::{Deserialize, Serialize};

/// Message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// A transfer accepted into the pending pool
    TransactionAnnounced,
    /// A block sealed and persisted to the chain
    BlockAnnounced,
    /// A request for some worker to mine the pending pool
    MiningRequested,
}

impl MessageType {
    /// Get NATS subject prefix for this message type
    pub fn subject_prefix(&self) -> &'static str {
        match self {
            MessageType::TransactionAnnounced => "ledger.transactions",
            MessageType::BlockAnnounced => "ledger.blocks",
            MessageType::MiningRequested => "ledger.mining",
        }
    }

    /// Get JetStream stream name for this message type
    pub fn stream_name(&self) -> &'static str {
        match self {
            MessageType::TransactionAnnounced => "LEDGER_TRANSACTIONS",
            MessageType::BlockAnnounced => "LEDGER_BLOCKS",
            MessageType::MiningRequested => "LEDGER_MINING",
        }
    }

    /// Subject filter matching every partition of this type
    pub fn subject_filter(&self) -> String {
        format!("{}.>", self.subject_prefix())
    }
}

/// Partition key for routing messages
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionKey {
    /// Route by account address (lowercased)
    Address(String),
    /// Broadcast to all partitions
    Broadcast,
}

impl PartitionKey {
    /// Get partitioning string for NATS subject
    pub fn to_subject_segment(&self) -> String {
        match self {
            PartitionKey::Address(address) => {
                format!("address.{}", sanitize_subject(&address.to_lowercase()))
            }
            PartitionKey::Broadcast => "all".to_string(),
        }
    }
}

/// Sanitize string for use in NATS subject
fn sanitize_subject(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
