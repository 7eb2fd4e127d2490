//! Message publisher with retry logic

use crate::{
    client::NatsClient,
    message::Message,
    metrics::{ANNOUNCE_DURATION, ANNOUNCE_TOTAL},
    types::MessageType,
    Error, Result, Transport,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Enable JetStream persistence
    pub use_jetstream: bool,

    /// Max retry attempts
    pub max_retry_attempts: u32,

    /// Initial retry delay (milliseconds)
    pub initial_retry_delay_ms: u64,

    /// Max retry delay (milliseconds)
    pub max_retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            use_jetstream: false,
            max_retry_attempts: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 2_000,
        }
    }
}

/// Message publisher
pub struct Publisher {
    client: Arc<NatsClient>,
    config: PublisherConfig,
}

impl Publisher {
    /// Create new publisher
    pub fn new(client: Arc<NatsClient>, config: PublisherConfig) -> Self {
        Self { client, config }
    }

    /// Publish message
    pub async fn publish(&self, message: &Message) -> Result<()> {
        let start = Instant::now();
        let subject = message.subject();

        debug!(message_id = %message.id, subject = %subject, "Publishing message");

        let payload = message.to_bytes()?;

        let result = self
            .publish_with_retry(&subject, &payload, message.message_type)
            .await;

        let duration = start.elapsed().as_secs_f64();
        ANNOUNCE_DURATION
            .with_label_values(&[message.message_type.subject_prefix()])
            .observe(duration);

        let status = if result.is_ok() { "success" } else { "error" };
        ANNOUNCE_TOTAL
            .with_label_values(&[message.message_type.subject_prefix(), status])
            .inc();

        result
    }

    /// Publish with exponential backoff retry
    async fn publish_with_retry(
        &self,
        subject: &str,
        payload: &[u8],
        message_type: MessageType,
    ) -> Result<()> {
        let mut attempts = 0;
        let mut delay = Duration::from_millis(self.config.initial_retry_delay_ms);
        let max_delay = Duration::from_millis(self.config.max_retry_delay_ms);

        loop {
            attempts += 1;

            match self.publish_once(subject, payload, message_type).await {
                Ok(_) => {
                    if attempts > 1 {
                        info!("Message published after {} attempts", attempts);
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempts >= self.config.max_retry_attempts {
                        error!("Failed to publish after {} attempts: {}", attempts, e);
                        return Err(e);
                    }

                    warn!(
                        "Publish failed (attempt {}), retrying in {:?}: {}",
                        attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;

                    delay = (delay * 2).min(max_delay);
                }
            }
        }
    }

    /// Single publish attempt
    async fn publish_once(
        &self,
        subject: &str,
        payload: &[u8],
        message_type: MessageType,
    ) -> Result<()> {
        if self.config.use_jetstream {
            let js = self.client.jetstream().await?;

            self.client
                .get_or_create_stream(message_type.stream_name(), vec![message_type.subject_filter()])
                .await?;

            let ack = js
                .publish(subject.to_string(), bytes::Bytes::copy_from_slice(payload))
                .await
                .map_err(|e| Error::Publish(e.to_string()))?;

            ack.await
                .map_err(|e| Error::JetStream(format!("Publish ack failed: {}", e)))?;
        } else {
            let client = self.client.client().await?;

            client
                .publish(subject.to_string(), bytes::Bytes::copy_from_slice(payload))
                .await
                .map_err(|e| Error::Publish(e.to_string()))?;

            client
                .flush()
                .await
                .map_err(|e| Error::Publish(format!("Flush failed: {}", e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Transport for Publisher {
    async fn send(&self, message: &Message) -> Result<()> {
        self.publish(message).await
    }
}
