//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unrepresentable amount
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid address or non-positive amount
    #[error("Validation error: {0}")]
    Validation(String),

    /// Durable chain store refused or failed a write
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Failed to resynchronize from the pending or durable store.
    /// Reads log this and continue with the in-process copy.
    #[error("Sync warning: {0}")]
    Sync(String),

    /// Storage error (RocksDB, Redis)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Binary serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Event bus error
    #[error("Event bus error: {0}")]
    Bus(#[from] message_bus::Error),

    /// Block not found
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// Concurrency error (mining worker panicked or was cancelled)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Storage(format!("redis: {}", err))
    }
}

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
