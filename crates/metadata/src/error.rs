//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique constraint rejected the write.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Fold a unique violation into `AlreadyExists`, keeping every other error.
///
/// SQLite reports `UNIQUE constraint failed: ...`, PostgreSQL SQLSTATE 23505;
/// sqlx classifies both as unique violations.
pub(crate) fn unique_violation(err: sqlx::Error, what: impl Into<String>) -> MetadataError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            MetadataError::AlreadyExists(what.into())
        }
        other => MetadataError::Database(other),
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
