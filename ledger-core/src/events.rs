//! Announcements of new transactions and blocks
//!
//! Delivery is at-least-once and best effort. The orchestrator logs a failed
//! announcement and carries on; it never rolls back ledger state for one.

use crate::{
    types::{Block, Transaction},
    Result,
};
use async_trait::async_trait;
use message_bus::{Message, MessageType, PartitionKey, Transport};
use std::sync::Arc;

/// Outbound event port
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Announce a newly submitted transaction
    async fn publish_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// Announce a newly persisted block
    async fn publish_block(&self, block: &Block) -> Result<()>;
}

/// [`EventChannel`] over any `message_bus` transport (NATS publisher or local bus)
#[derive(Clone)]
pub struct BusEventChannel {
    transport: Arc<dyn Transport>,
}

impl BusEventChannel {
    /// Wrap a transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Envelope for a transaction announcement
    pub fn transaction_message(transaction: &Transaction) -> Result<Message> {
        let view = transaction.to_view();
        let hash = view.hash.clone();
        Ok(Message::new(
            MessageType::TransactionAnnounced,
            PartitionKey::Address(transaction.sender.clone()),
            serde_json::to_value(view)?,
        )
        .with_header("tx_hash", hash))
    }

    /// Envelope for a block announcement
    pub fn block_message(block: &Block) -> Result<Message> {
        Ok(Message::new(
            MessageType::BlockAnnounced,
            PartitionKey::Broadcast,
            serde_json::to_value(block.to_view())?,
        )
        .with_correlation_id(block.hash.clone())
        .with_header("block_index", block.index.to_string()))
    }
}

#[async_trait]
impl EventChannel for BusEventChannel {
    async fn publish_transaction(&self, transaction: &Transaction) -> Result<()> {
        let message = Self::transaction_message(transaction)?;
        self.transport.send(&message).await?;
        Ok(())
    }

    async fn publish_block(&self, block: &Block) -> Result<()> {
        let message = Self::block_message(block)?;
        self.transport.send(&message).await?;
        Ok(())
    }
}
