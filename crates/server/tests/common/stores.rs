//! Fault-injecting session cache and metadata store.

use async_trait::async_trait;
use blober_cache::{CacheError, CacheResult, SessionStore, SweepStats};
use blober_core::{Account, App, Blob, NewBlob};
use blober_metadata::repos::{AccountRepo, AppRepo, BlobRepo};
use blober_metadata::{MetadataError, MetadataResult, MetadataStore, MetadataTransaction};
use std::sync::{Arc, Mutex};

/// Session cache whose writes always fail; reads go to the real cache.
#[allow(dead_code)]
pub struct FailingSessions {
    inner: Arc<dyn SessionStore>,
}

#[allow(dead_code)]
impl FailingSessions {
    pub fn new(inner: Arc<dyn SessionStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SessionStore for FailingSessions {
    async fn put(&self, _key: &str, _account: &Account) -> CacheResult<()> {
        Err(CacheError::Database(sled::Error::Io(std::io::Error::other(
            "injected session write failure",
        ))))
    }

    async fn get(&self, key: &str) -> CacheResult<Account> {
        self.inner.get(key).await
    }

    async fn sweep(&self) -> CacheResult<SweepStats> {
        self.inner.sweep().await
    }

    async fn flush(&self) -> CacheResult<()> {
        self.inner.flush().await
    }
}

/// Metadata store that refuses every blob insert and remembers the hashes
/// it was asked to record.
#[allow(dead_code)]
pub struct FailingBlobInserts {
    inner: Arc<dyn MetadataStore>,
    pub rejected_hashes: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FailingBlobInserts {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner,
            rejected_hashes: Mutex::new(Vec::new()),
        }
    }

    pub fn rejected(&self) -> Vec<String> {
        self.rejected_hashes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountRepo for FailingBlobInserts {
    async fn find_account_by_email(&self, email: &str) -> MetadataResult<Option<Account>> {
        self.inner.find_account_by_email(email).await
    }

    async fn find_account_by_id(&self, id: i64) -> MetadataResult<Option<Account>> {
        self.inner.find_account_by_id(id).await
    }
}

#[async_trait]
impl AppRepo for FailingBlobInserts {
    async fn find_app_by_id(&self, id: i64) -> MetadataResult<Option<App>> {
        self.inner.find_app_by_id(id).await
    }

    async fn find_app_by_name(&self, account_id: i64, name: &str) -> MetadataResult<Option<App>> {
        self.inner.find_app_by_name(account_id, name).await
    }

    async fn find_app_by_namespace(&self, namespace: &str) -> MetadataResult<Option<App>> {
        self.inner.find_app_by_namespace(namespace).await
    }

    async fn list_apps(&self, account_id: i64) -> MetadataResult<Vec<App>> {
        self.inner.list_apps(account_id).await
    }
}

#[async_trait]
impl BlobRepo for FailingBlobInserts {
    async fn find_blob(&self, app_id: i64, hash: &str) -> MetadataResult<Option<Blob>> {
        self.inner.find_blob(app_id, hash).await
    }

    async fn list_blobs(&self, app_id: i64, page: i64) -> MetadataResult<Vec<Blob>> {
        self.inner.list_blobs(app_id, page).await
    }

    async fn insert_blob(&self, blob: &NewBlob) -> MetadataResult<Blob> {
        self.rejected_hashes.lock().unwrap().push(blob.hash.clone());
        Err(MetadataError::Internal(
            "injected blob insert failure".to_string(),
        ))
    }
}

#[async_trait]
impl MetadataStore for FailingBlobInserts {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }

    async fn begin(&self) -> MetadataResult<Box<dyn MetadataTransaction>> {
        self.inner.begin().await
    }
}
