//! Durable chain storage using RocksDB
//!
//! # Column Families
//!
//! - `blocks` - Block headers (key: index, big-endian u64)
//! - `block_hashes` - Hash index (key: block hash, value: index)
//! - `transactions` - Transaction rows (key: index || seq, big-endian)
//!
//! A block is written in one `WriteBatch`: header, hash index entry and every
//! transaction row commit together or not at all.

use crate::{
    error::{Error, Result},
    types::{Block, Transaction},
    Config,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{
    BlockBasedOptions, ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, DBCompressionType,
    Direction, IteratorMode, Options, SliceTransform, WriteBatch, DB,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Column family names
pub const CF_BLOCKS: &str = "blocks";
/// Hash → index column family
pub const CF_BLOCK_HASHES: &str = "block_hashes";
/// Transaction rows column family
pub const CF_TRANSACTIONS: &str = "transactions";

/// Result of [`ChainStore::save_block`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Block written
    Inserted,
    /// A block with the same hash already exists; nothing written
    AlreadyPresent,
}

/// Durable, append-only block store
pub trait ChainStore: Send + Sync {
    /// Persist a block atomically. Idempotent on block hash.
    fn save_block(&self, block: &Block) -> Result<SaveOutcome>;

    /// All blocks in index order
    fn get_all_blocks(&self) -> Result<Vec<Block>>;

    /// Block with the given hash
    fn get_block_by_hash(&self, hash: &str) -> Result<Option<Block>>;

    /// Highest-index block
    fn get_latest_block(&self) -> Result<Option<Block>>;

    /// Number of stored blocks
    fn len(&self) -> Result<u64>;

    /// No blocks stored
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Stored block header (transactions live in their own column family)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Position in the chain
    pub index: u64,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Predecessor hash
    pub previous_hash: String,
    /// Block hash
    pub hash: String,
    /// Proof-of-work counter
    pub nonce: u64,
    /// Number of transaction rows
    pub tx_count: u32,
}

impl BlockHeader {
    fn of(block: &Block) -> Result<Self> {
        let tx_count = u32::try_from(block.transactions.len())
            .map_err(|_| Error::Persistence(format!("block {} has too many transactions", block.index)))?;
        Ok(Self {
            index: block.index,
            timestamp: block.timestamp,
            previous_hash: block.previous_hash.clone(),
            hash: block.hash.clone(),
            nonce: block.nonce,
            tx_count,
        })
    }
}

/// RocksDB-backed [`ChainStore`]
pub struct RocksChainStore {
    db: Arc<DB>,
    /// Serializes the length check and the batch write
    write_lock: Mutex<()>,
}

impl RocksChainStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );

        // Append-only workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let db = DB::open_cf_descriptors(&db_opts, path, Self::cf_descriptors())?;

        tracing::info!(path = ?path, "Opened chain store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Column family layout, shared with tools that open the database directly
    pub fn cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
        vec![
            ColumnFamilyDescriptor::new(CF_BLOCKS, Self::cf_options_blocks()),
            ColumnFamilyDescriptor::new(CF_BLOCK_HASHES, Self::cf_options_block_hashes()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
        ]
    }

    fn cf_options_blocks() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(DBCompressionType::Zstd);
        opts
    }

    fn cf_options_block_hashes() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(DBCompressionType::Lz4);
        // Point lookups by hash
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(DBCompressionType::Zstd);
        // Rows of one block share the 8-byte index prefix
        opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(8));
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn tx_key(index: u64, seq: u32) -> [u8; 12] {
        let mut key = [0u8; 12];
        key[..8].copy_from_slice(&index.to_be_bytes());
        key[8..].copy_from_slice(&seq.to_be_bytes());
        key
    }

    fn decode_index(bytes: &[u8]) -> Result<u64> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| Error::Storage(format!("corrupt block index ({} bytes)", bytes.len())))?;
        Ok(u64::from_be_bytes(raw))
    }

    fn latest_header(&self) -> Result<Option<BlockHeader>> {
        let cf = self.cf_handle(CF_BLOCKS)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (_, value) = item?;
                Ok(Some(bincode::deserialize(&value)?))
            }
            None => Ok(None),
        }
    }

    fn read_transactions(&self, header: &BlockHeader) -> Result<Vec<Transaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let prefix = header.index.to_be_bytes();

        let mut transactions = Vec::with_capacity(header.tx_count as usize);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            transactions.push(bincode::deserialize(&value)?);
        }

        if transactions.len() != header.tx_count as usize {
            return Err(Error::Storage(format!(
                "block {} expects {} transactions, found {}",
                header.index,
                header.tx_count,
                transactions.len()
            )));
        }

        Ok(transactions)
    }

    fn assemble(&self, header: BlockHeader) -> Result<Block> {
        let transactions = self.read_transactions(&header)?;
        Ok(Block {
            index: header.index,
            timestamp: header.timestamp,
            transactions,
            previous_hash: header.previous_hash,
            hash: header.hash,
            nonce: header.nonce,
        })
    }

    /// Get block by index
    pub fn get_block(&self, index: u64) -> Result<Block> {
        let cf = self.cf_handle(CF_BLOCKS)?;
        let value = self
            .db
            .get_cf(cf, index.to_be_bytes())?
            .ok_or_else(|| Error::BlockNotFound(index.to_string()))?;
        self.assemble(bincode::deserialize(&value)?)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("Chain store closed");
        Ok(())
    }
}

impl ChainStore for RocksChainStore {
    fn save_block(&self, block: &Block) -> Result<SaveOutcome> {
        let _guard = self.write_lock.lock();

        let cf_hashes = self.cf_handle(CF_BLOCK_HASHES)?;
        if self.db.get_cf(cf_hashes, block.hash.as_bytes())?.is_some() {
            tracing::debug!(block_index = block.index, hash = %block.hash, "Block already stored");
            return Ok(SaveOutcome::AlreadyPresent);
        }

        let expected = self.latest_header()?.map(|h| h.index + 1).unwrap_or(0);
        if block.index != expected {
            return Err(Error::Persistence(format!(
                "block index {} does not extend chain of length {}",
                block.index, expected
            )));
        }

        let header = BlockHeader::of(block)?;
        let mut batch = WriteBatch::default();

        let cf_blocks = self.cf_handle(CF_BLOCKS)?;
        batch.put_cf(cf_blocks, block.index.to_be_bytes(), bincode::serialize(&header)?);
        batch.put_cf(cf_hashes, block.hash.as_bytes(), block.index.to_be_bytes());

        let cf_txs = self.cf_handle(CF_TRANSACTIONS)?;
        for (seq, tx) in block.transactions.iter().enumerate() {
            batch.put_cf(cf_txs, Self::tx_key(block.index, seq as u32), bincode::serialize(tx)?);
        }

        self.db
            .write(batch)
            .map_err(|e| Error::Persistence(e.to_string()))?;

        tracing::info!(
            block_index = block.index,
            hash = %block.hash,
            tx_count = header.tx_count,
            "Block persisted"
        );

        Ok(SaveOutcome::Inserted)
    }

    fn get_all_blocks(&self) -> Result<Vec<Block>> {
        let cf = self.cf_handle(CF_BLOCKS)?;
        let mut blocks = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            blocks.push(self.assemble(bincode::deserialize(&value)?)?);
        }
        Ok(blocks)
    }

    fn get_block_by_hash(&self, hash: &str) -> Result<Option<Block>> {
        let cf = self.cf_handle(CF_BLOCK_HASHES)?;
        match self.db.get_cf(cf, hash.as_bytes())? {
            Some(raw) => Ok(Some(self.get_block(Self::decode_index(&raw)?)?)),
            None => Ok(None),
        }
    }

    fn get_latest_block(&self) -> Result<Option<Block>> {
        self.latest_header()?.map(|h| self.assemble(h)).transpose()
    }

    fn len(&self) -> Result<u64> {
        Ok(self.latest_header()?.map(|h| h.index + 1).unwrap_or(0))
    }
}

/// Open a raw handle on an existing chain database (maintenance tooling)
pub fn open_raw(path: impl AsRef<Path>) -> Result<DB> {
    let mut opts = Options::default();
    opts.create_if_missing(false);
    Ok(DB::open_cf_descriptors(&opts, path, RocksChainStore::cf_descriptors())?)
}
