//! NATS connection shared by publishers and subscribers

use crate::{metrics::NATS_CONNECTIONS, Error, Result};
use async_nats::jetstream::{
    self,
    stream::{Config as StreamConfig, RetentionPolicy, StorageType},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// NATS connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// Server URL
    pub url: String,

    /// Connection name reported to the server
    pub name: String,

    /// How long JetStream keeps announcements (seconds)
    pub stream_max_age_secs: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            name: "ledger-core".to_string(),
            stream_max_age_secs: 7 * 24 * 3600,
        }
    }
}

/// Lazily connected NATS client
pub struct NatsClient {
    config: NatsConfig,
    client: OnceCell<async_nats::Client>,
}

impl NatsClient {
    /// Create client; no connection is attempted until first use
    pub fn new(config: NatsConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Connection settings
    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    /// Get (connecting on first call) the core NATS client
    pub async fn client(&self) -> Result<async_nats::Client> {
        let client = self
            .client
            .get_or_try_init(|| async {
                info!(url = %self.config.url, "Connecting to NATS");
                match async_nats::ConnectOptions::new()
                    .name(self.config.name.as_str())
                    .connect(self.config.url.as_str())
                    .await
                {
                    Ok(client) => {
                        NATS_CONNECTIONS.with_label_values(&["connected"]).inc();
                        Ok(client)
                    }
                    Err(e) => {
                        NATS_CONNECTIONS.with_label_values(&["failed"]).inc();
                        error!(url = %self.config.url, "NATS connection failed: {}", e);
                        Err(Error::Connection(e.to_string()))
                    }
                }
            })
            .await?;

        Ok(client.clone())
    }

    /// Get JetStream context over the shared connection
    pub async fn jetstream(&self) -> Result<jetstream::Context> {
        Ok(jetstream::new(self.client().await?))
    }

    /// Ensure a file-backed stream exists for the given subjects
    pub async fn get_or_create_stream(&self, name: &str, subjects: Vec<String>) -> Result<()> {
        let js = self.jetstream().await?;

        let config = StreamConfig {
            name: name.to_string(),
            subjects,
            retention: RetentionPolicy::Limits,
            max_age: Duration::from_secs(self.config.stream_max_age_secs),
            storage: StorageType::File,
            ..Default::default()
        };

        js.get_or_create_stream(config)
            .await
            .map_err(|e| Error::JetStream(format!("stream {}: {}", name, e)))?;

        Ok(())
    }
}
