//! Sled-backed blob metadata cache.

use crate::error::{CacheError, CacheResult};
use crate::traits::BlobStore;
use async_trait::async_trait;
use blober_core::Blob;
use blober_core::app::blob_cache_key;
use std::path::Path;
use tracing::{info, warn};

/// Blob metadata cache stored in its own sled database. Entries never expire.
pub struct SledBlobCache {
    db: sled::Db,
}

impl SledBlobCache {
    /// Open or create the blob database at `path`.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let db = sled::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), entries = db.len(), "Opened blob cache");
        Ok(Self { db })
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

#[async_trait]
impl BlobStore for SledBlobCache {
    async fn put(&self, namespace: &str, hash: &str, blob: &Blob) -> CacheResult<()> {
        let value = serde_json::to_vec(blob)?;
        self.db
            .insert(blob_cache_key(namespace, hash).as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, namespace: &str, hash: &str) -> CacheResult<Blob> {
        let key = blob_cache_key(namespace, hash);
        let value = self
            .db
            .get(key.as_bytes())?
            .ok_or_else(|| CacheError::NotFound(key.clone()))?;

        serde_json::from_slice(&value).map_err(|e| {
            warn!(key = %key, error = %e, "Undecodable blob cache entry");
            CacheError::NotFound(key)
        })
    }

    async fn flush(&self) -> CacheResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}
