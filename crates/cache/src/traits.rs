//! Cache trait definitions.

use crate::error::CacheResult;
use async_trait::async_trait;
use blober_core::{Account, Blob};

/// Outcome of one session sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries examined.
    pub scanned: u64,
    /// Expired entries removed.
    pub removed: u64,
    /// Expired entries left alone because they were refreshed mid-sweep.
    pub raced: u64,
    /// Entries that could not be decoded.
    pub skipped: u64,
}

/// Key-value store of live sessions, keyed by session key.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Store `account` under `key` in a fresh session, replacing any
    /// previous session for the same key.
    async fn put(&self, key: &str, account: &Account) -> CacheResult<()>;

    /// Account of the session stored under `key`.
    ///
    /// Fails with `NotFound` when the key is absent or the entry cannot be
    /// decoded.
    async fn get(&self, key: &str) -> CacheResult<Account>;

    /// Remove sessions older than the configured lifetime.
    async fn sweep(&self) -> CacheResult<SweepStats>;

    /// Persist pending writes.
    async fn flush(&self) -> CacheResult<()>;
}

/// Key-value store of blob metadata for the download path.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn put(&self, namespace: &str, hash: &str, blob: &Blob) -> CacheResult<()>;

    /// Fails with `NotFound` when nothing (decodable) is cached.
    async fn get(&self, namespace: &str, hash: &str) -> CacheResult<Blob>;

    async fn flush(&self) -> CacheResult<()>;
}
