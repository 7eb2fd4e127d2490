//! Event bus for ledger announcements
//!
//! Provides best-effort pub/sub for transaction and block announcements:
//! - `Publisher` for NATS (core or JetStream) with retry and exponential backoff
//! - `LocalBus` for in-process fan-out over a tokio broadcast channel
//! - `Subscriber` for consuming NATS subjects with a `MessageHandler`
//!
//! Delivery is at-least-once and best-effort. Publishing with nobody
//! listening is not an error.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod error;
pub mod local;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod subscriber;
pub mod types;

use async_trait::async_trait;

pub use client::{NatsClient, NatsConfig};
pub use error::{Error, Result};
pub use local::LocalBus;
pub use message::Message;
pub use publisher::{Publisher, PublisherConfig};
pub use subscriber::{MessageHandler, Subscriber};
pub use types::{MessageType, PartitionKey};

/// Anything that can deliver a message envelope to its subscribers
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one message
    async fn send(&self, message: &Message) -> Result<()>;
}
