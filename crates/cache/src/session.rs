//! Sled-backed session cache.

use crate::error::{CacheError, CacheResult};
use crate::traits::{SessionStore, SweepStats};
use async_trait::async_trait;
use blober_core::Account;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A stored session record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub account: Account,
}

impl Session {
    pub fn new(account: Account) -> Self {
        Self {
            id: Uuid::new_v4(),
            created: OffsetDateTime::now_utc(),
            account,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime, lifetime: Duration) -> bool {
        now - self.created > lifetime
    }
}

/// Session cache stored in its own sled database.
#[derive(Clone)]
pub struct SledSessionCache {
    db: sled::Db,
    lifetime: Duration,
}

impl SledSessionCache {
    /// Open or create the session database at `path`.
    pub fn open(path: impl AsRef<Path>, lifetime: Duration) -> CacheResult<Self> {
        let db = sled::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), entries = db.len(), "Opened session cache");
        Ok(Self { db, lifetime })
    }

    /// Store a prepared session record as-is.
    pub fn insert_session(&self, key: &str, session: &Session) -> CacheResult<()> {
        let value = serde_json::to_vec(session)?;
        self.db.insert(key.as_bytes(), value)?;
        Ok(())
    }

    /// Full session record stored under `key`.
    pub fn session(&self, key: &str) -> CacheResult<Session> {
        let value = self
            .db
            .get(key.as_bytes())?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        serde_json::from_slice(&value).map_err(|e| {
            warn!(key = %key, error = %e, "Undecodable session entry");
            CacheError::NotFound(key.to_string())
        })
    }

    /// Sweep as if the current time were `now`.
    ///
    /// Each expired entry is removed only if it still holds the exact bytes
    /// that were read, so a session refreshed during the scan survives.
    pub fn sweep_at(&self, now: OffsetDateTime) -> CacheResult<SweepStats> {
        let mut stats = SweepStats::default();

        for item in self.db.iter() {
            let (key, value) = item?;
            stats.scanned += 1;

            let session: Session = match serde_json::from_slice(&value) {
                Ok(session) => session,
                Err(e) => {
                    warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "Skipping undecodable session entry"
                    );
                    stats.skipped += 1;
                    continue;
                }
            };

            if !session.is_expired(now, self.lifetime) {
                continue;
            }

            match self
                .db
                .compare_and_swap(&key, Some(&value), None as Option<&[u8]>)?
            {
                Ok(()) => stats.removed += 1,
                Err(_) => {
                    debug!(
                        key = %String::from_utf8_lossy(&key),
                        "Session changed during sweep, keeping it"
                    );
                    stats.raced += 1;
                }
            }
        }

        Ok(stats)
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

#[async_trait]
impl SessionStore for SledSessionCache {
    async fn put(&self, key: &str, account: &Account) -> CacheResult<()> {
        self.insert_session(key, &Session::new(account.clone()))
    }

    async fn get(&self, key: &str) -> CacheResult<Account> {
        self.session(key).map(|session| session.account)
    }

    async fn sweep(&self) -> CacheResult<SweepStats> {
        let cache = self.clone();
        tokio::task::spawn_blocking(move || cache.sweep_at(OffsetDateTime::now_utc()))
            .await
            .map_err(|e| {
                CacheError::Database(sled::Error::Io(std::io::Error::other(format!(
                    "spawn_blocking failed: {e}"
                ))))
            })?
    }

    async fn flush(&self) -> CacheResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}
