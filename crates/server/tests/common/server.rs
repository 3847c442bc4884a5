//! Server test utilities.

use blober_cache::{BlobStore, SessionStore, SledBlobCache, SledSessionCache};
use blober_core::config::{AppConfig, CacheConfig, MetadataConfig, StorageConfig};
use blober_metadata::{MetadataStore, SqliteStore};
use blober_server::{AppState, create_router};
use blober_storage::{FilesystemBackend, ObjectStore};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

/// Stores handed to the app state; tests may wrap any of them.
#[allow(dead_code)]
pub struct Stores {
    pub storage: Arc<dyn ObjectStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub blobs: Arc<dyn BlobStore>,
}

fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::for_testing();
    config.storage = StorageConfig::Filesystem {
        path: root.join("storage"),
    };
    config.metadata = MetadataConfig::Sqlite {
        path: root.join("blober.db"),
    };
    config.cache = CacheConfig {
        session_path: root.join("sessions"),
        blob_path: root.join("blobs"),
        ..CacheConfig::default()
    };
    config
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with filesystem storage.
    pub async fn new() -> Self {
        Self::build(|_| {}, |_| {}).await
    }

    /// Create a test server whose object store wraps the filesystem backend.
    pub async fn with_storage<F>(wrap: F) -> Self
    where
        F: FnOnce(Arc<dyn ObjectStore>) -> Arc<dyn ObjectStore>,
    {
        Self::build(|_| {}, |stores| stores.storage = wrap(stores.storage.clone())).await
    }

    /// Create a test server after letting `wrap` replace any of its stores.
    pub async fn with_stores<F>(wrap: F) -> Self
    where
        F: FnOnce(&mut Stores),
    {
        Self::build(|_| {}, wrap).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(modifier, |_| {}).await
    }

    async fn build<C, W>(modifier: C, wrap: W) -> Self
    where
        C: FnOnce(&mut AppConfig),
        W: FnOnce(&mut Stores),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = test_config(temp_dir.path());
        modifier(&mut config);

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("blober.db"))
                .await
                .expect("Failed to create metadata store"),
        );

        let sessions: Arc<dyn SessionStore> = Arc::new(
            SledSessionCache::open(&config.cache.session_path, config.cache.session_lifetime())
                .expect("Failed to open session cache"),
        );
        let blobs: Arc<dyn BlobStore> = Arc::new(
            SledBlobCache::open(&config.cache.blob_path).expect("Failed to open blob cache"),
        );

        let mut stores = Stores {
            storage,
            metadata,
            sessions,
            blobs,
        };
        wrap(&mut stores);

        let state = AppState::new(
            config,
            stores.storage,
            stores.metadata,
            stores.sessions,
            stores.blobs,
        );
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }
}
