//! Error types for memory storage.

use std::path::PathBuf;

/// Errors returned by memory stores.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A record file with the same name is already present.
    #[error("record file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    /// Record content cannot be persisted.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
