//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache and its backends.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key has no entry in the backend. Recovered by the façade as a miss.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// File backend could not commit or read its file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entries could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Document store unreachable or rejected the operation
    #[error("Document store error: {0}")]
    Store(String),

    /// A read-through was needed but no read function is set
    #[error("No read function set, cannot load key: {0}")]
    MissingReadFunction(String),

    /// The read function failed; its error is passed through untouched
    #[error(transparent)]
    ReadFunction(anyhow::Error),
}

impl CacheError {
    /// Returns true for the cache-miss signal.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
