//! Blob repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use blober_core::{Blob, NewBlob};

/// Repository for blob records.
#[async_trait]
pub trait BlobRepo: Send + Sync {
    /// Get a blob by its hash within an app.
    async fn find_blob(&self, app_id: i64, hash: &str) -> MetadataResult<Option<Blob>>;

    /// One page of an app's blobs ordered by ID. Pages start at 0 and hold
    /// `blober_core::BLOB_PAGE_SIZE` rows.
    async fn list_blobs(&self, app_id: i64, page: i64) -> MetadataResult<Vec<Blob>>;

    /// Record an uploaded blob.
    async fn insert_blob(&self, blob: &NewBlob) -> MetadataResult<Blob>;
}
