//! NATS subscriber dispatching to a message handler

use crate::{
    client::NatsClient,
    message::Message,
    metrics::{CONSUME_TOTAL, HANDLE_DURATION},
    types::MessageType,
    Error, Result,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Message handler trait
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle incoming message
    async fn handle(&self, message: Message) -> Result<()>;
}

/// Message subscriber (core NATS; announcements are not replayed)
pub struct Subscriber {
    client: Arc<NatsClient>,
    message_type: MessageType,
}

impl Subscriber {
    /// Create new subscriber
    pub fn new(client: Arc<NatsClient>, message_type: MessageType) -> Self {
        Self {
            client,
            message_type,
        }
    }

    /// Subscribe and process messages until the subscription closes
    pub async fn subscribe<H>(&self, handler: Arc<H>) -> Result<()>
    where
        H: MessageHandler + 'static,
    {
        let client = self.client.client().await?;
        let subject = self.message_type.subject_filter();
        let label = self.message_type.subject_prefix();

        let mut subscriber = client
            .subscribe(subject.clone())
            .await
            .map_err(|e| Error::Subscribe(e.to_string()))?;

        info!(subject = %subject, "Subscribed to NATS subject");

        while let Some(msg) = subscriber.next().await {
            match Message::from_bytes(&msg.payload) {
                Ok(message) => {
                    let start = Instant::now();

                    CONSUME_TOTAL.with_label_values(&[label, "handled"]).inc();

                    if let Err(e) = handler.handle(message).await {
                        error!("Error handling message: {}", e);
                    }

                    HANDLE_DURATION
                        .with_label_values(&[label])
                        .observe(start.elapsed().as_secs_f64());
                }
                Err(e) => {
                    error!("Failed to parse message: {}", e);
                    CONSUME_TOTAL.with_label_values(&[label, "parse_error"]).inc();
                }
            }
        }

        Ok(())
    }
}
