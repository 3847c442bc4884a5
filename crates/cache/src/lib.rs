//! Session and blob metadata caches for blober.
//!
//! Both caches are sled databases. The relational store remains the source
//! of truth; everything here can be rebuilt from it or from fresh logins.

pub mod blob;
pub mod error;
pub mod session;
pub mod sweeper;
pub mod traits;

pub use blob::SledBlobCache;
pub use error::{CacheError, CacheResult};
pub use session::{Session, SledSessionCache};
pub use sweeper::spawn_sweeper;
pub use traits::{BlobStore, SessionStore, SweepStats};

use blober_core::config::CacheConfig;
use std::sync::Arc;

/// Both caches opened from configuration.
pub struct Caches {
    pub sessions: Arc<dyn SessionStore>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Open the session and blob databases named in `config`.
pub fn from_config(config: &CacheConfig) -> CacheResult<Caches> {
    let sessions = SledSessionCache::open(&config.session_path, config.session_lifetime())?;
    let blobs = SledBlobCache::open(&config.blob_path)?;

    Ok(Caches {
        sessions: Arc::new(sessions),
        blobs: Arc::new(blobs),
    })
}
