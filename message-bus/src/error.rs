//! Error types for message bus

use thiserror::Error;

/// Message bus error
#[derive(Debug, Error)]
pub enum Error {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Publish error
    #[error("Publish error: {0}")]
    Publish(String),

    /// Subscribe error
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// JetStream error (stream creation, publish acknowledgment)
    #[error("JetStream error: {0}")]
    JetStream(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Request timed out (milliseconds)
    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
