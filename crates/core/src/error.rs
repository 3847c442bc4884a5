//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
///
/// The `Display` text of the validation variants is shown to API clients
/// verbatim, so it must stay stable.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Invalid password. too weak")]
    WeakPassword,

    #[error("app can not have an empty name")]
    EmptyAppName,

    #[error("invalid account")]
    InvalidAccount,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error describes bad caller input rather than a fault.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidEmail | Self::WeakPassword | Self::EmptyAppName | Self::InvalidAccount
        )
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
