//! Error types for the sync engine.

use thiserror::Error;

use crate::store::StoreError;
use crate::transport::TransportError;

/// Errors that can occur in sync engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Fetching headers from the server failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Committing or loading durable state failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// A persisted folder snapshot could not be decoded.
    #[error("Corrupt snapshot for folder {folder}: {reason}")]
    CorruptSnapshot {
        /// Folder whose snapshot was rejected.
        folder: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The operation was cancelled by a folder or engine shutdown.
    #[error("Operation cancelled")]
    Cancelled,

    /// The engine has been shut down.
    #[error("Sync engine has been shut down")]
    ShutDown,

    /// The view has been closed.
    #[error("Folder view has been closed")]
    ViewClosed,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
