//! Volatile store for not-yet-mined transactions
//!
//! The pending list is always written and read as a whole collection with a
//! bounded expiry. The same store caches the chain summary. Last full
//! replace wins across processes.

use crate::{
    config::PendingConfig,
    types::{ChainSummary, Transaction},
    Result,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Key suffixes under the configured prefix
pub mod keys {
    /// Pending transaction list
    pub const PENDING: &str = "pending_tx";
    /// Cached chain summary
    pub const STATE: &str = "state";
}

/// Whole-collection pending transaction store
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Replace the pending list
    async fn set_pending(&self, transactions: &[Transaction]) -> Result<()>;

    /// Current pending list; empty when absent or expired
    async fn get_pending(&self) -> Result<Vec<Transaction>>;

    /// Cache `{chain_length, latest_hash}`
    async fn cache_chain_summary(&self, summary: &ChainSummary) -> Result<()>;

    /// Cached summary, if fresh
    async fn chain_summary(&self) -> Result<Option<ChainSummary>>;
}

struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> Expiring<T> {
    fn live(slot: &Option<Self>) -> Option<T> {
        slot.as_ref()
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.value.clone())
    }
}

/// In-process [`PendingStore`] honoring the same expiry as Redis
pub struct MemoryPendingStore {
    pending: Mutex<Option<Expiring<Vec<Transaction>>>>,
    summary: Mutex<Option<Expiring<ChainSummary>>>,
    pending_ttl: Duration,
    summary_ttl: Duration,
}

impl MemoryPendingStore {
    /// Store with explicit expiries
    pub fn new(pending_ttl: Duration, summary_ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(None),
            summary: Mutex::new(None),
            pending_ttl,
            summary_ttl,
        }
    }

    /// Store with the expiries from `config`
    pub fn from_config(config: &PendingConfig) -> Self {
        Self::new(
            Duration::from_secs(config.pending_ttl_secs),
            Duration::from_secs(config.chain_state_ttl_secs),
        )
    }
}

impl Default for MemoryPendingStore {
    fn default() -> Self {
        Self::from_config(&PendingConfig::default())
    }
}

#[async_trait]
impl PendingStore for MemoryPendingStore {
    async fn set_pending(&self, transactions: &[Transaction]) -> Result<()> {
        *self.pending.lock() = Some(Expiring {
            value: transactions.to_vec(),
            expires_at: Instant::now() + self.pending_ttl,
        });
        Ok(())
    }

    async fn get_pending(&self) -> Result<Vec<Transaction>> {
        Ok(Expiring::live(&self.pending.lock()).unwrap_or_default())
    }

    async fn cache_chain_summary(&self, summary: &ChainSummary) -> Result<()> {
        *self.summary.lock() = Some(Expiring {
            value: summary.clone(),
            expires_at: Instant::now() + self.summary_ttl,
        });
        Ok(())
    }

    async fn chain_summary(&self) -> Result<Option<ChainSummary>> {
        Ok(Expiring::live(&self.summary.lock()))
    }
}

/// Redis-backed [`PendingStore`]
#[derive(Clone)]
pub struct RedisPendingStore {
    redis: ConnectionManager,
    pending_key: String,
    state_key: String,
    pending_ttl_secs: u64,
    state_ttl_secs: u64,
}

impl RedisPendingStore {
    /// Connect using `config.redis_url`
    pub async fn connect(config: &PendingConfig, redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        info!(url = redis_url, prefix = %config.key_prefix, "Connected pending store to Redis");
        Ok(Self::new(redis, config))
    }

    /// Wrap an existing connection
    pub fn new(redis: ConnectionManager, config: &PendingConfig) -> Self {
        Self {
            redis,
            pending_key: format!("{}:{}", config.key_prefix, keys::PENDING),
            state_key: format!("{}:{}", config.key_prefix, keys::STATE),
            pending_ttl_secs: config.pending_ttl_secs,
            state_ttl_secs: config.chain_state_ttl_secs,
        }
    }

    async fn set_json(&self, key: &str, json: String, ttl_secs: u64) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(json)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_json(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }
}

#[async_trait]
impl PendingStore for RedisPendingStore {
    async fn set_pending(&self, transactions: &[Transaction]) -> Result<()> {
        let json = serde_json::to_string(transactions)?;
        self.set_json(&self.pending_key, json, self.pending_ttl_secs).await?;
        debug!(count = transactions.len(), "Pending list mirrored");
        Ok(())
    }

    async fn get_pending(&self) -> Result<Vec<Transaction>> {
        match self.get_json(&self.pending_key).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn cache_chain_summary(&self, summary: &ChainSummary) -> Result<()> {
        let json = serde_json::to_string(summary)?;
        self.set_json(&self.state_key, json, self.state_ttl_secs).await
    }

    async fn chain_summary(&self) -> Result<Option<ChainSummary>> {
        match self.get_json(&self.state_key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
