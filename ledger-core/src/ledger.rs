//! Main ledger orchestration layer
//!
//! `Ledger` keeps three stores consistent without a cross-store transaction:
//! the durable chain store (source of truth for confirmed blocks), the
//! volatile pending store (authoritative pending list) and the event bus.
//! A transfer moves through
//! `Submitted → Pending → Mining → Sealed → Persisted → Pending-cleared → Announced`.
//! A crash before persistence leaves the transfer pending. A crash between
//! persistence and clearing can make it mined twice; that risk is accepted.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     ledger.submit("alice", "bob", "1.5").await?;
//!     ledger.mine(Some("bob"), true).await?;
//!     println!("bob: {}", ledger.balance("bob"));
//!
//!     Ok(())
//! }
//! ```

use crate::{
    amount::{self, AmountInput},
    balance::{balance_of, history_of},
    config::MAX_DIFFICULTY,
    events::{BusEventChannel, EventChannel},
    genesis::{genesis_block, GenesisManifest},
    metrics::Metrics,
    mining::{mine_block, MiningOutcome, Reward},
    pending::{MemoryPendingStore, PendingStore, RedisPendingStore},
    report::{financial_report, FinancialReport},
    storage::{ChainStore, RocksChainStore, SaveOutcome},
    types::{
        Block, Chain, ChainInfo, ChainSummary, HistoryEntry, Transaction, same_address, SYSTEM_SENDER,
    },
    validation::is_chain_valid,
    Config, Error, Result,
};
use message_bus::{LocalBus, Message, NatsClient, Publisher, Transport};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

/// Address validity check supplied by the wallet layer
pub trait AddressPolicy: Send + Sync {
    /// Whether `address` may appear in a submitted transfer
    fn is_valid(&self, address: &str) -> bool;
}

/// Accepts any non-blank address
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyAddress;

impl AddressPolicy for AnyAddress {
    fn is_valid(&self, address: &str) -> bool {
        !address.trim().is_empty()
    }
}

/// Accepts `0x` followed by 40 hex digits, any case
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmAddress;

impl AddressPolicy for EvmAddress {
    fn is_valid(&self, address: &str) -> bool {
        address.len() == 42
            && (address.starts_with("0x") || address.starts_with("0X"))
            && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
    }
}

/// What happened to a submitted transfer beyond the pending pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// The accepted transfer
    pub transaction: Transaction,
    /// Its hash
    pub hash: String,
    /// Pending list written to the volatile store
    pub mirrored: bool,
    /// Announcement published
    pub announced: bool,
}

/// One transfer of a batch submission
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferRequest {
    /// Sending address
    pub sender: String,
    /// Receiving address
    pub recipient: String,
    /// Display amount or base units
    pub amount: AmountInput,
}

/// Per-item result of [`Ledger::submit_batch`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// Position in the submitted batch
    pub position: usize,
    /// Receipt when accepted
    pub receipt: Option<SubmitReceipt>,
    /// Reason when rejected
    pub error: Option<String>,
}

/// Result of [`Ledger::bootstrap`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    /// Store was empty; genesis block created and persisted
    Created(Block),
    /// Existing chain loaded
    Loaded {
        /// Blocks loaded
        length: usize,
    },
}

/// Result of [`Ledger::refresh_cache`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRefresh {
    /// Chain length written to the summary
    pub chain_length: u64,
    /// Pending transactions re-mirrored
    pub pending_transactions: usize,
}

/// Main ledger interface
pub struct Ledger {
    chain_store: Arc<dyn ChainStore>,
    pending_store: Arc<dyn PendingStore>,
    events: Arc<dyn EventChannel>,
    address_policy: Arc<dyn AddressPolicy>,

    /// In-process copy of the confirmed chain, refreshed on every read
    chain: RwLock<Chain>,

    /// In-process copy of the pending list; guards read-modify-replace
    pending: Mutex<Vec<Transaction>>,

    /// One mining run at a time per process
    mine_lock: Mutex<()>,

    local_bus: Option<Arc<LocalBus>>,
    metrics: Metrics,
}

impl Ledger {
    /// Assemble a ledger over explicit collaborators
    pub fn new(
        chain_store: Arc<dyn ChainStore>,
        pending_store: Arc<dyn PendingStore>,
        events: Arc<dyn EventChannel>,
        difficulty: u32,
        mining_reward: u128,
    ) -> Result<Self> {
        if difficulty > MAX_DIFFICULTY {
            return Err(Error::Config(format!(
                "difficulty {} exceeds {}",
                difficulty, MAX_DIFFICULTY
            )));
        }

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("failed to create metrics: {}", e)))?;

        Ok(Self {
            chain_store,
            pending_store,
            events,
            address_policy: Arc::new(AnyAddress),
            chain: RwLock::new(Chain::new(difficulty, mining_reward)),
            pending: Mutex::new(Vec::new()),
            mine_lock: Mutex::new(()),
            local_bus: None,
            metrics,
        })
    }

    /// Open ledger with configuration: RocksDB chain store, Redis or
    /// in-process pending store, NATS or in-process bus, then bootstrap from
    /// the configured genesis manifest.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let chain_store = Arc::new(RocksChainStore::open(&config)?);

        let pending_store: Arc<dyn PendingStore> = match &config.pending.redis_url {
            Some(url) => Arc::new(RedisPendingStore::connect(&config.pending, url).await?),
            None => {
                info!("No Redis configured, pending transactions kept in process");
                Arc::new(MemoryPendingStore::from_config(&config.pending))
            }
        };

        let (transport, local_bus): (Arc<dyn Transport>, Option<Arc<LocalBus>>) =
            match config.bus.nats() {
                Some(nats) => {
                    let client = Arc::new(NatsClient::new(nats));
                    let publisher = Publisher::new(client, config.bus.publisher.clone());
                    (Arc::new(publisher) as Arc<dyn Transport>, None)
                }
                None => {
                    info!("No NATS configured, announcements delivered in process");
                    let bus = Arc::new(LocalBus::new(config.bus.local_capacity));
                    (bus.clone() as Arc<dyn Transport>, Some(bus))
                }
            };

        let mut ledger = Self::new(
            chain_store,
            pending_store,
            Arc::new(BusEventChannel::new(transport)),
            config.chain.difficulty,
            config.chain.mining_reward_base_units()?,
        )?;
        ledger.local_bus = local_bus;

        let manifest = GenesisManifest::load(&config.chain.genesis_file);
        ledger.bootstrap(manifest.as_ref()).await?;

        Ok(ledger)
    }

    /// Set address validity policy
    pub fn with_address_policy(mut self, policy: Arc<dyn AddressPolicy>) -> Self {
        self.address_policy = policy;
        self
    }

    /// Attach an in-process bus for [`Ledger::subscribe`]
    pub fn with_local_bus(mut self, bus: Arc<LocalBus>) -> Self {
        self.local_bus = Some(bus);
        self
    }

    /// Receive announcements published on the in-process bus
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Message>> {
        self.local_bus.as_ref().map(|bus| bus.subscribe())
    }

    /// Metrics for this ledger
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Required leading zero hex digits
    pub fn difficulty(&self) -> u32 {
        self.chain.read().difficulty
    }

    /// Reward per mined block in base units
    pub fn mining_reward(&self) -> u128 {
        self.chain.read().mining_reward
    }

    /// Load the chain, creating and persisting the genesis block if the
    /// durable store is empty. Store failures here are fatal.
    pub async fn bootstrap(&self, manifest: Option<&GenesisManifest>) -> Result<Bootstrap> {
        let blocks = self.chain_store.get_all_blocks()?;

        if !blocks.is_empty() {
            let length = blocks.len();
            self.replace_chain(blocks);
            info!(length, "Chain loaded from store");
            return Ok(Bootstrap::Loaded { length });
        }

        let genesis = genesis_block(manifest);
        self.chain_store.save_block(&genesis)?;
        self.replace_chain(vec![genesis.clone()]);

        info!(
            hash = %genesis.hash,
            allocations = genesis.transactions.len(),
            "Genesis block created"
        );

        Ok(Bootstrap::Created(genesis))
    }

    /// Accept a transfer into the pending pool.
    ///
    /// Addresses and amount are validated before any effect. Mirroring to
    /// the pending store and announcing are independent best-effort steps
    /// reported in the receipt.
    pub async fn submit(
        &self,
        sender: &str,
        recipient: &str,
        amount: impl Into<AmountInput>,
    ) -> Result<SubmitReceipt> {
        if !self.address_policy.is_valid(sender) {
            return Err(Error::Validation(format!("invalid sender address: {:?}", sender)));
        }
        if !self.address_policy.is_valid(recipient) {
            return Err(Error::Validation(format!("invalid recipient address: {:?}", recipient)));
        }
        if same_address(sender, SYSTEM_SENDER) {
            return Err(Error::Validation(format!("{} is a reserved sender", SYSTEM_SENDER)));
        }

        let base_units = amount::parse_amount(amount)?;
        if base_units <= 0 {
            return Err(Error::Validation(format!(
                "amount must be positive, got {}",
                amount::format(base_units)
            )));
        }

        let transaction = Transaction::new(sender, recipient, base_units as u128);
        let hash = transaction.calculate_hash();

        let mirrored = {
            let mut pending = self.pending.lock().await;
            self.resync_pending(&mut pending).await;
            pending.push(transaction.clone());
            self.metrics.set_pending(pending.len());

            match self.pending_store.set_pending(&pending).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(tx_hash = %hash, error = %e, "Failed to mirror pending transactions");
                    false
                }
            }
        };

        self.metrics.record_submission();

        let announced = match self.events.publish_transaction(&transaction).await {
            Ok(()) => true,
            Err(e) => {
                warn!(tx_hash = %hash, error = %e, "Failed to announce transaction");
                false
            }
        };

        info!(
            tx_hash = %hash,
            sender,
            recipient,
            amount = %amount::format(base_units),
            "Transaction submitted"
        );

        Ok(SubmitReceipt {
            transaction,
            hash,
            mirrored,
            announced,
        })
    }

    /// Submit several transfers; each succeeds or fails on its own
    pub async fn submit_batch(&self, requests: Vec<TransferRequest>) -> Vec<BatchItemResult> {
        let mut results = Vec::with_capacity(requests.len());

        for (position, request) in requests.into_iter().enumerate() {
            let result = self
                .submit(&request.sender, &request.recipient, request.amount)
                .await;
            results.push(match result {
                Ok(receipt) => BatchItemResult {
                    position,
                    receipt: Some(receipt),
                    error: None,
                },
                Err(e) => BatchItemResult {
                    position,
                    receipt: None,
                    error: Some(e.to_string()),
                },
            });
        }

        results
    }

    /// Seal the pending transactions into a new block and persist it.
    ///
    /// Returns [`MiningOutcome::NothingToMine`] when the pending pool is
    /// empty, reward or not. On a persistence failure the block is
    /// discarded and pending transactions stay where they are.
    pub async fn mine(
        &self,
        reward_address: Option<&str>,
        include_reward: bool,
    ) -> Result<MiningOutcome> {
        let reward_address = match (include_reward, reward_address) {
            (true, Some(address)) if self.address_policy.is_valid(address) => Some(address.to_string()),
            (true, Some(address)) => {
                return Err(Error::Validation(format!("invalid reward address: {:?}", address)))
            }
            (true, None) => {
                return Err(Error::Validation(
                    "reward requested without a reward address".to_string(),
                ))
            }
            (false, _) => None,
        };

        let _mining = self.mine_lock.lock().await;

        let pending = {
            let mut pending = self.pending.lock().await;
            self.resync_pending(&mut pending).await;
            pending.clone()
        };

        if pending.is_empty() {
            info!("No pending transactions, nothing to mine");
            return Ok(MiningOutcome::NothingToMine);
        }

        let chain = self.sync_chain();
        let previous = chain
            .latest()
            .cloned()
            .ok_or_else(|| Error::BlockNotFound("genesis block missing; bootstrap first".to_string()))?;
        let reward = reward_address.map(|address| Reward {
            address,
            amount: chain.mining_reward,
        });
        let difficulty = chain.difficulty;

        info!(
            pending = pending.len(),
            difficulty,
            with_reward = reward.is_some(),
            "Mining started"
        );

        let (outcome, elapsed) = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let outcome = mine_block(&pending, reward, &previous, difficulty);
            (outcome, start.elapsed())
        })
        .await
        .map_err(|e| Error::Concurrency(format!("mining worker failed: {}", e)))?;

        let block = match outcome {
            MiningOutcome::Sealed(block) => block,
            MiningOutcome::NothingToMine => return Ok(MiningOutcome::NothingToMine),
        };

        match self.chain_store.save_block(&block) {
            Ok(SaveOutcome::Inserted) => {}
            Ok(SaveOutcome::AlreadyPresent) => {
                warn!(block_index = block.index, hash = %block.hash, "Block was already persisted");
            }
            Err(e) => {
                error!(block_index = block.index, error = %e, "Failed to persist mined block");
                return Err(match e {
                    Error::Persistence(msg) => Error::Persistence(msg),
                    other => Error::Persistence(other.to_string()),
                });
            }
        }

        self.metrics.record_block_mined(elapsed.as_secs_f64());
        self.clear_mined(&block).await;
        self.append_confirmed(&block);

        let summary = ChainSummary {
            chain_length: block.index + 1,
            latest_hash: block.hash.clone(),
        };
        if let Err(e) = self.pending_store.cache_chain_summary(&summary).await {
            warn!(error = %e, "Failed to cache chain summary");
        }

        if let Err(e) = self.events.publish_block(&block).await {
            warn!(block_index = block.index, error = %e, "Failed to announce block");
        }

        info!(
            block_index = block.index,
            hash = %block.hash,
            nonce = block.nonce,
            tx_count = block.transactions.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Block mined"
        );

        Ok(MiningOutcome::Sealed(block))
    }

    /// Confirmed chain, re-read from the durable store
    pub fn read_chain(&self) -> Vec<Block> {
        self.sync_chain().blocks
    }

    /// Net balance in base units
    pub fn balance(&self, address: &str) -> i128 {
        balance_of(&self.sync_chain().blocks, address)
    }

    /// Confirmed transfers touching `address`
    pub fn history(&self, address: &str) -> Vec<HistoryEntry> {
        history_of(&self.sync_chain().blocks, address)
    }

    /// Pending transactions, re-read from the pending store
    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        let mut pending = self.pending.lock().await;
        self.resync_pending(&mut pending).await;
        pending.clone()
    }

    /// Block with the given hash
    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        match self.chain_store.get_block_by_hash(hash) {
            Ok(block) => block,
            Err(e) => {
                self.sync_warning("chain", &e);
                self.chain.read().blocks.iter().find(|b| b.hash == hash).cloned()
            }
        }
    }

    /// Highest block
    pub fn latest_block(&self) -> Option<Block> {
        match self.chain_store.get_latest_block() {
            Ok(block) => block,
            Err(e) => {
                self.sync_warning("chain", &e);
                self.chain.read().latest().cloned()
            }
        }
    }

    /// Linkage and hashes of the stored chain hold
    pub fn is_chain_valid(&self) -> bool {
        is_chain_valid(&self.sync_chain().blocks)
    }

    /// Length, parameters, pending count and validity, all freshly read
    pub async fn chain_info(&self) -> ChainInfo {
        let chain = self.sync_chain();
        let pending = self.pending_transactions().await.len();
        ChainInfo {
            length: chain.len() as u64,
            difficulty: chain.difficulty,
            mining_reward: chain.mining_reward,
            mining_reward_formatted: amount::format(
                i128::try_from(chain.mining_reward).unwrap_or(i128::MAX),
            ),
            pending_transactions: pending,
            is_valid: is_chain_valid(&chain.blocks),
        }
    }

    /// Chain summary as cached in the pending store
    pub async fn cached_summary(&self) -> Result<Option<ChainSummary>> {
        self.pending_store.chain_summary().await
    }

    /// Rewrite the cached chain summary and re-mirror the pending list
    pub async fn refresh_cache(&self) -> Result<CacheRefresh> {
        let blocks = self.chain_store.get_all_blocks()?;
        self.replace_chain(blocks);

        let summary = self
            .chain
            .read()
            .summary()
            .ok_or_else(|| Error::BlockNotFound("chain is empty".to_string()))?;
        self.pending_store.cache_chain_summary(&summary).await?;

        let pending_count = {
            let mut pending = self.pending.lock().await;
            *pending = self.pending_store.get_pending().await?;
            self.pending_store.set_pending(&pending).await?;
            pending.len()
        };
        self.metrics.set_pending(pending_count);

        info!(
            chain_length = summary.chain_length,
            pending_transactions = pending_count,
            "Cache refreshed"
        );

        Ok(CacheRefresh {
            chain_length: summary.chain_length,
            pending_transactions: pending_count,
        })
    }

    /// Volume, rewards, leaderboard and daily activity of the stored chain
    pub fn financial_report(&self) -> FinancialReport {
        financial_report(&self.sync_chain().blocks, chrono::Utc::now())
    }

    /// Replace the in-process pending copy from the store; keep the copy on failure
    async fn resync_pending(&self, pending: &mut Vec<Transaction>) {
        match self.pending_store.get_pending().await {
            Ok(list) => {
                *pending = list;
                self.metrics.set_pending(pending.len());
            }
            Err(e) => self.sync_warning("pending", &e),
        }
    }

    /// Replace the in-process chain from the store; keep the copy on failure
    fn sync_chain(&self) -> Chain {
        match self.chain_store.get_all_blocks() {
            Ok(blocks) => self.replace_chain(blocks),
            Err(e) => {
                self.sync_warning("chain", &e);
                self.chain.read().clone()
            }
        }
    }

    fn replace_chain(&self, blocks: Vec<Block>) -> Chain {
        let mut chain = self.chain.write();
        chain.blocks = blocks;
        self.metrics.set_chain_length(chain.len());
        chain.clone()
    }

    fn append_confirmed(&self, block: &Block) {
        let mut chain = self.chain.write();
        if chain.len() as u64 == block.index {
            chain.blocks.push(block.clone());
        }
        self.metrics.set_chain_length(chain.len());
    }

    /// Drop the mined transactions from the pending pool. Transfers that
    /// arrived while mining stay pending.
    async fn clear_mined(&self, block: &Block) {
        let mined: HashSet<String> = block.transactions.iter().map(Transaction::calculate_hash).collect();

        let mut pending = self.pending.lock().await;
        self.resync_pending(&mut pending).await;
        pending.retain(|tx| !mined.contains(&tx.calculate_hash()));
        self.metrics.set_pending(pending.len());

        if let Err(e) = self.pending_store.set_pending(&pending).await {
            warn!(
                block_index = block.index,
                error = %e,
                "Failed to clear mined transactions from pending store"
            );
        }
    }

    fn sync_warning(&self, store: &str, err: &Error) {
        let warning = sync_error(store, err);
        self.metrics.record_sync_warning(store);
        warn!(store, error = %warning, "Store unavailable, serving in-process copy");
    }
}

/// A failed store read, recast as the degraded-read warning
fn sync_error(store: &str, err: &Error) -> Error {
    Error::Sync(format!("{} store: {}", store, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::BASE_UNITS_PER_TOKEN;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory chain store whose reads and writes can be switched off
    #[derive(Default)]
    struct FlakyChainStore {
        blocks: parking_lot::Mutex<Vec<Block>>,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
    }

    impl ChainStore for FlakyChainStore {
        fn save_block(&self, block: &Block) -> Result<SaveOutcome> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Storage("disk on fire".to_string()));
            }
            let mut blocks = self.blocks.lock();
            if blocks.iter().any(|b| b.hash == block.hash) {
                return Ok(SaveOutcome::AlreadyPresent);
            }
            blocks.push(block.clone());
            Ok(SaveOutcome::Inserted)
        }

        fn get_all_blocks(&self) -> Result<Vec<Block>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Error::Storage("connection refused".to_string()));
            }
            Ok(self.blocks.lock().clone())
        }

        fn get_block_by_hash(&self, hash: &str) -> Result<Option<Block>> {
            Ok(self.get_all_blocks()?.into_iter().find(|b| b.hash == hash))
        }

        fn get_latest_block(&self) -> Result<Option<Block>> {
            Ok(self.get_all_blocks()?.last().cloned())
        }

        fn len(&self) -> Result<u64> {
            Ok(self.get_all_blocks()?.len() as u64)
        }
    }

    /// Event channel that always fails
    struct DeadChannel;

    #[async_trait]
    impl EventChannel for DeadChannel {
        async fn publish_transaction(&self, _: &Transaction) -> Result<()> {
            Err(Error::Bus(message_bus::Error::Connection("down".to_string())))
        }

        async fn publish_block(&self, _: &Block) -> Result<()> {
            Err(Error::Bus(message_bus::Error::Connection("down".to_string())))
        }
    }

    async fn test_ledger(store: Arc<FlakyChainStore>, events: Arc<dyn EventChannel>) -> Ledger {
        let ledger = Ledger::new(
            store,
            Arc::new(MemoryPendingStore::default()),
            events,
            1,
            100 * BASE_UNITS_PER_TOKEN as u128,
        )
        .unwrap();
        ledger.bootstrap(None).await.unwrap();
        ledger
    }

    fn local_events() -> Arc<dyn EventChannel> {
        Arc::new(BusEventChannel::new(Arc::new(LocalBus::new(16))))
    }

    #[tokio::test]
    async fn test_bootstrap_creates_then_loads() {
        let store = Arc::new(FlakyChainStore::default());
        let ledger = test_ledger(store.clone(), local_events()).await;
        assert_eq!(ledger.read_chain().len(), 1);

        let again = ledger.bootstrap(None).await.unwrap();
        assert_eq!(again, Bootstrap::Loaded { length: 1 });
    }

    #[tokio::test]
    async fn test_submit_validates_before_effects() {
        let ledger = test_ledger(Arc::new(FlakyChainStore::default()), local_events()).await;

        assert!(matches!(ledger.submit("", "bob", "1").await, Err(Error::Validation(_))));
        assert!(matches!(ledger.submit("alice", "bob", "0").await, Err(Error::Validation(_))));
        assert!(matches!(ledger.submit("alice", "bob", "-3").await, Err(Error::Validation(_))));
        assert!(matches!(ledger.submit("alice", "bob", "abc").await, Err(Error::Parse(_))));
        assert!(matches!(
            ledger.submit(SYSTEM_SENDER, "bob", "1").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ledger.submit("SISTEMA", "bob", "1").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ledger.submit("sistema", "bob", "1").await,
            Err(Error::Validation(_))
        ));

        assert!(ledger.pending_transactions().await.is_empty());
        assert_eq!(ledger.metrics().transactions_submitted.get(), 0);
    }

    #[tokio::test]
    async fn test_evm_policy() {
        let ledger = test_ledger(Arc::new(FlakyChainStore::default()), local_events())
            .await
            .with_address_policy(Arc::new(EvmAddress));

        let alice = format!("0x{}", "a".repeat(40));
        let bob = format!("0X{}", "B".repeat(40));
        assert!(ledger.submit(&alice, &bob, "1").await.is_ok());
        assert!(matches!(
            ledger.submit(&alice, "bob", "1").await,
            Err(Error::Validation(_))
        ));
        assert!(!EvmAddress.is_valid(&format!("0x{}", "g".repeat(40))));
    }

    #[tokio::test]
    async fn test_announce_failure_reported_not_fatal() {
        let ledger = test_ledger(Arc::new(FlakyChainStore::default()), Arc::new(DeadChannel)).await;

        let receipt = ledger.submit("alice", "bob", "2").await.unwrap();
        assert!(receipt.mirrored);
        assert!(!receipt.announced);

        let block = ledger.mine(None, false).await.unwrap().into_block().unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert!(ledger.pending_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_reward_without_address_rejected() {
        let ledger = test_ledger(Arc::new(FlakyChainStore::default()), local_events()).await;
        ledger.submit("alice", "bob", "1").await.unwrap();

        let err = ledger.mine(None, true).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(ledger.pending_transactions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_pending() {
        let store = Arc::new(FlakyChainStore::default());
        let ledger = test_ledger(store.clone(), local_events()).await;
        ledger.submit("alice", "bob", "1").await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = ledger.mine(Some("miner"), true).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(ledger.pending_transactions().await.len(), 1);
        assert_eq!(ledger.read_chain().len(), 1);

        store.fail_writes.store(false, Ordering::SeqCst);
        let block = ledger.mine(Some("miner"), true).await.unwrap().into_block().unwrap();
        assert_eq!(block.index, 1);
        assert!(ledger.pending_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_fall_back_to_stale_copy() {
        let store = Arc::new(FlakyChainStore::default());
        let ledger = test_ledger(store.clone(), local_events()).await;
        ledger.submit("alice", "bob", "3").await.unwrap();
        ledger.mine(None, false).await.unwrap();

        store.fail_reads.store(true, Ordering::SeqCst);
        assert_eq!(ledger.balance("bob"), 3 * BASE_UNITS_PER_TOKEN);
        assert_eq!(ledger.read_chain().len(), 2);
        assert!(ledger.latest_block().is_some());
        assert!(
            ledger
                .metrics()
                .sync_warnings
                .with_label_values(&["chain"])
                .get()
                >= 2
        );
    }

    #[test]
    fn test_sync_error_names_store_and_cause() {
        let err = sync_error("chain", &Error::Storage("connection refused".to_string()));
        match &err {
            Error::Sync(msg) => {
                assert!(msg.starts_with("chain store"));
                assert!(msg.contains("connection refused"));
            }
            other => panic!("expected sync warning, got {:?}", other),
        }
        assert!(err.to_string().starts_with("Sync warning"));
    }

    #[tokio::test]
    async fn test_submit_batch_reports_each_item() {
        let ledger = test_ledger(Arc::new(FlakyChainStore::default()), local_events()).await;
        let requests: Vec<TransferRequest> = serde_json::from_str(
            r#"[
                {"sender": "alice", "recipient": "bob", "amount": 1.5},
                {"sender": "alice", "recipient": "bob", "amount": "nope"},
                {"sender": "bob", "recipient": "carol", "amount": "2"}
            ]"#,
        )
        .unwrap();

        let results = ledger.submit_batch(requests).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].receipt.is_some());
        assert!(results[1].error.is_some());
        assert_eq!(results[2].position, 2);
        assert_eq!(ledger.pending_transactions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_cache_and_chain_info() {
        let ledger = test_ledger(Arc::new(FlakyChainStore::default()), local_events()).await;
        ledger.submit("alice", "bob", "1").await.unwrap();

        let refreshed = ledger.refresh_cache().await.unwrap();
        assert_eq!(refreshed, CacheRefresh { chain_length: 1, pending_transactions: 1 });

        let summary = ledger.cached_summary().await.unwrap().unwrap();
        assert_eq!(summary.chain_length, 1);

        let info = ledger.chain_info().await;
        assert_eq!(info.length, 1);
        assert_eq!(info.pending_transactions, 1);
        assert_eq!(info.mining_reward_formatted, "100");
        assert!(info.is_valid);
    }

    #[tokio::test]
    async fn test_mine_caches_summary_and_announces() {
        let bus = Arc::new(LocalBus::new(16));
        let ledger = Ledger::new(
            Arc::new(FlakyChainStore::default()),
            Arc::new(MemoryPendingStore::default()),
            Arc::new(BusEventChannel::new(bus.clone())),
            1,
            5,
        )
        .unwrap()
        .with_local_bus(bus);
        ledger.bootstrap(None).await.unwrap();
        let mut rx = ledger.subscribe().unwrap();

        ledger.submit("alice", "bob", "1").await.unwrap();
        let block = ledger.mine(Some("miner"), true).await.unwrap().into_block().unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.message_type, message_bus::MessageType::TransactionAnnounced);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.message_type, message_bus::MessageType::BlockAnnounced);

        let summary = ledger.cached_summary().await.unwrap().unwrap();
        assert_eq!(summary.latest_hash, block.hash);
        assert_eq!(ledger.balance("miner"), 5);
        assert_eq!(ledger.block_by_hash(&block.hash), Some(block));
        assert_eq!(ledger.metrics().blocks_mined.get(), 1);
    }

    #[tokio::test]
    async fn test_transfers_submitted_during_mining_stay_pending() {
        let store = Arc::new(FlakyChainStore::default());
        let ledger = test_ledger(store, local_events()).await;
        ledger.submit("alice", "bob", "1").await.unwrap();

        // Simulate a transfer mirrored by another process after the snapshot
        let late = Transaction::new("carol", "dave", 9);
        let mined = {
            let mut pending = ledger.pending_store.get_pending().await.unwrap();
            let snapshot = pending.clone();
            pending.push(late.clone());
            let previous = ledger.latest_block().unwrap();
            let block = mine_block(&snapshot, None, &previous, 1).into_block().unwrap();
            ledger.chain_store.save_block(&block).unwrap();
            ledger.pending_store.set_pending(&pending).await.unwrap();
            block
        };
        ledger.clear_mined(&mined).await;

        assert_eq!(ledger.pending_transactions().await, vec![late]);
    }
}
