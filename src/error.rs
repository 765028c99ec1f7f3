//! Store and medium error types

use thiserror::Error;

/// Errors raised by a backing medium
#[derive(Debug, Error)]
pub enum MediumError {
    #[error("Storage medium unavailable: {0}")]
    Unavailable(String),

    #[error("Medium capacity of {capacity} bytes exhausted writing {key}")]
    Full { key: String, capacity: usize },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Failed to serialize value: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Failed to deserialize value for {key}: {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage quota would be exceeded writing {key}: {required} bytes needed, {used} of {limit} used")]
    QuotaExceeded {
        key: String,
        required: usize,
        used: usize,
        limit: usize,
    },

    #[error("Chunk {index} of {count} missing for {key}")]
    CorruptedChunk { key: String, index: usize, count: usize },

    #[error("Chunk count '{raw}' for {key} is not a number")]
    CorruptedSentinel { key: String, raw: String },

    #[error(transparent)]
    Unavailable(#[from] MediumError),
}

impl StoreError {
    /// Check if the stored data exists but is inconsistent
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StoreError::CorruptedChunk { .. } | StoreError::CorruptedSentinel { .. }
        )
    }

    /// Check if this is a quota rejection
    pub fn is_quota(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}
