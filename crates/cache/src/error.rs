//! Cache error types.

use thiserror::Error;

/// Cache operation errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Absent, or present but no longer decodable.
    #[error("cache entry not found: {0}")]
    NotFound(String),

    #[error("cache database error: {0}")]
    Database(#[from] sled::Error),

    #[error("cache encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
