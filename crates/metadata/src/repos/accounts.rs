//! Account repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use blober_core::Account;

/// Read access to accounts. Inserts go through a `MetadataTransaction`.
#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Get a live account by email (exact match).
    async fn find_account_by_email(&self, email: &str) -> MetadataResult<Option<Account>>;

    /// Get a live account by ID.
    async fn find_account_by_id(&self, id: i64) -> MetadataResult<Option<Account>>;
}
