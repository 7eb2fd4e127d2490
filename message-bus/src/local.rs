//! In-process bus over a tokio broadcast channel
//!
//! Used when no NATS server is configured, and by tests. Slow receivers
//! lose the oldest messages once `capacity` is exceeded.

use crate::{
    message::Message,
    metrics::{ANNOUNCE_TOTAL, LOCAL_UNHEARD_TOTAL},
    types::MessageType,
    Result, Transport,
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// In-process broadcast bus
#[derive(Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<Message>,
}

impl LocalBus {
    /// Create bus buffering up to `capacity` messages per receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every message published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    /// Stream of messages of one type; lagged gaps are skipped with a warning
    pub fn stream(&self, message_type: MessageType) -> impl Stream<Item = Message> {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| async move {
            match item {
                Ok(message) if message.message_type == message_type => Some(message),
                Ok(_) => None,
                Err(e) => {
                    warn!("Local bus subscriber lagged: {}", e);
                    None
                }
            }
        })
    }

    /// Number of live receivers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Transport for LocalBus {
    async fn send(&self, message: &Message) -> Result<()> {
        let prefix = message.message_type.subject_prefix();
        match self.sender.send(message.clone()) {
            Ok(receivers) => {
                debug!(message_id = %message.id, receivers, "Message delivered locally");
            }
            Err(_) => {
                debug!(message_id = %message.id, "No local subscribers, message dropped");
                LOCAL_UNHEARD_TOTAL.with_label_values(&[prefix]).inc();
            }
        }
        ANNOUNCE_TOTAL.with_label_values(&[prefix, "success"]).inc();
        Ok(())
    }
}
