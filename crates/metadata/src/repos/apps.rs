//! App repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use blober_core::App;

/// Read access to apps. Inserts go through a `MetadataTransaction`.
#[async_trait]
pub trait AppRepo: Send + Sync {
    async fn find_app_by_id(&self, id: i64) -> MetadataResult<Option<App>>;

    /// Get an app by name, scoped to its owner.
    async fn find_app_by_name(&self, account_id: i64, name: &str) -> MetadataResult<Option<App>>;

    async fn find_app_by_namespace(&self, namespace: &str) -> MetadataResult<Option<App>>;

    /// All apps owned by `account_id`, oldest first.
    async fn list_apps(&self, account_id: i64) -> MetadataResult<Vec<App>>;
}
