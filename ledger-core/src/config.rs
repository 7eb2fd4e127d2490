//! Configuration for the ledger

use crate::amount;
use message_bus::{NatsConfig, PublisherConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest meaningful difficulty: every hex digit of a SHA-256 digest
pub const MAX_DIFFICULTY: u32 = 64;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Chain parameters
    pub chain: ChainConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Pending-transaction store
    pub pending: PendingConfig,

    /// Event bus
    pub bus: BusConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "ledger-core".to_string(),
            chain: ChainConfig::default(),
            rocksdb: RocksDBConfig::default(),
            pending: PendingConfig::default(),
            bus: BusConfig::default(),
        }
    }
}

/// Chain parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero hex digits required of a block hash
    pub difficulty: u32,

    /// Reward per mined block, in display units
    pub mining_reward: String,

    /// Genesis manifest (JSON)
    pub genesis_file: PathBuf,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            mining_reward: "100".to_string(),
            genesis_file: PathBuf::from("genesis.json"),
        }
    }
}

impl ChainConfig {
    /// Mining reward in base units
    pub fn mining_reward_base_units(&self) -> crate::Result<u128> {
        let base_units = amount::parse_amount(self.mining_reward.as_str())?;
        u128::try_from(base_units).map_err(|_| {
            crate::Error::Config(format!("mining_reward must not be negative: {}", self.mining_reward))
        })
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            target_file_size_mb: 64,
            max_background_jobs: 2,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

/// Pending-transaction store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PendingConfig {
    /// Redis URL; the in-process store is used when unset
    pub redis_url: Option<String>,

    /// Key prefix (`<prefix>:pending_tx`, `<prefix>:state`)
    pub key_prefix: String,

    /// Pending list expiry (seconds)
    pub pending_ttl_secs: u64,

    /// Chain summary expiry (seconds)
    pub chain_state_ttl_secs: u64,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "blockchain".to_string(),
            pending_ttl_secs: 300,
            chain_state_ttl_secs: 3600,
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// NATS URL; announcements stay in-process when unset
    pub nats_url: Option<String>,

    /// Connection name reported to NATS
    pub client_name: String,

    /// Publisher retry and JetStream settings
    pub publisher: PublisherConfig,

    /// Capacity of the in-process broadcast channel
    pub local_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            nats_url: None,
            client_name: "ledger-core".to_string(),
            publisher: PublisherConfig::default(),
            local_capacity: 1024,
        }
    }
}

impl BusConfig {
    /// NATS connection settings, when a URL is configured
    pub fn nats(&self) -> Option<NatsConfig> {
        self.nats_url.as_ref().map(|url| NatsConfig {
            url: url.clone(),
            name: self.client_name.clone(),
            ..NatsConfig::default()
        })
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `LEDGER_*` environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> crate::Result<Self> {
        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(difficulty) = std::env::var("LEDGER_DIFFICULTY") {
            self.chain.difficulty = difficulty.trim().parse().map_err(|e| {
                crate::Error::Config(format!("LEDGER_DIFFICULTY {:?}: {}", difficulty, e))
            })?;
        }

        if let Ok(reward) = std::env::var("LEDGER_MINING_REWARD") {
            self.chain.mining_reward = reward;
        }

        if let Ok(path) = std::env::var("LEDGER_GENESIS_FILE") {
            self.chain.genesis_file = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("LEDGER_REDIS_URL") {
            self.pending.redis_url = Some(url);
        }

        if let Ok(url) = std::env::var("LEDGER_NATS_URL") {
            self.bus.nats_url = Some(url);
        }

        Ok(self)
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.chain.difficulty > MAX_DIFFICULTY {
            return Err(crate::Error::Config(format!(
                "difficulty {} exceeds {}",
                self.chain.difficulty, MAX_DIFFICULTY
            )));
        }

        self.chain
            .mining_reward_base_units()
            .map_err(|e| crate::Error::Config(format!("mining_reward: {}", e)))?;

        if self.pending.pending_ttl_secs == 0 || self.pending.chain_state_ttl_secs == 0 {
            return Err(crate::Error::Config("store expiries must be positive".to_string()));
        }

        if self.bus.local_capacity == 0 {
            return Err(crate::Error::Config("bus.local_capacity must be positive".to_string()));
        }

        Ok(())
    }
}
