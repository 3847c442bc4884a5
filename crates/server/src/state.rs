//! Application state shared across handlers.

use crate::service::BloberService;
use blober_cache::{BlobStore, SessionStore};
use blober_core::config::AppConfig;
use blober_metadata::MetadataStore;
use blober_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Relational store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Session cache.
    pub sessions: Arc<dyn SessionStore>,
    /// Blob metadata cache.
    pub blobs: Arc<dyn BlobStore>,
    /// Operations behind the handlers, built from the stores above.
    pub service: Arc<BloberService>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        sessions: Arc<dyn SessionStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let service = BloberService::new(
            metadata.clone(),
            storage.clone(),
            sessions.clone(),
            blobs.clone(),
            config.server.public_base_url(),
            config.server.batch_upload_concurrency,
        );

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            sessions,
            blobs,
            service: Arc::new(service),
        }
    }
}
