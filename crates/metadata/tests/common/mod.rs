//! Metadata store test utilities.

#![allow(dead_code)]

use blober_core::{Account, App, NewAccount, NewApp, NewBlob};
use blober_metadata::{MetadataError, MetadataResult, MetadataStore, PostgresStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;

/// Stable prefix for container startup failures; tests skip on it.
pub const POSTGRES_CONTAINER_START_ERR_PREFIX: &str = "postgres-container-start:";

/// SQLite store in a temporary directory.
pub struct TestMetadata {
    store: Arc<dyn MetadataStore>,
    _temp_dir: TempDir,
}

impl TestMetadata {
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir()?;
        let store = SqliteStore::new(temp_dir.path().join("test.db")).await?;
        Ok(Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }
}

/// PostgreSQL store backed by a throwaway container.
pub struct PostgresTestMetadata {
    store: Arc<dyn MetadataStore>,
    _container: ContainerAsync<Postgres>,
}

impl PostgresTestMetadata {
    pub async fn new() -> MetadataResult<Self> {
        let container = Postgres::default()
            .with_tag("15-alpine")
            .start()
            .await
            .map_err(|e| {
                MetadataError::Internal(format!(
                    "{POSTGRES_CONTAINER_START_ERR_PREFIX} Failed to start PostgreSQL container: {e}"
                ))
            })?;

        let host = container
            .get_host()
            .await
            .map_err(|e| MetadataError::Internal(e.to_string()))?;
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .map_err(|e| MetadataError::Internal(e.to_string()))?;

        // Default credentials of the postgres module image.
        let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");
        let store = PostgresStore::from_url(&url, 5).await?;

        Ok(Self {
            store: Arc::new(store),
            _container: container,
        })
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }
}

/// Run a test against SQLite, then against PostgreSQL when a container
/// runtime is available and SKIP_POSTGRES_TESTS is unset.
pub async fn run_metadata_test_both<F, Fut>(test_fn: F)
where
    F: Fn(Arc<dyn MetadataStore>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    let sqlite = TestMetadata::new()
        .await
        .expect("Failed to create SQLite test metadata");
    test_fn.clone()(sqlite.store()).await;

    if std::env::var("SKIP_POSTGRES_TESTS").is_err() {
        match PostgresTestMetadata::new().await {
            Ok(postgres) => test_fn(postgres.store()).await,
            Err(err) => eprintln!("Skipping PostgreSQL metadata tests: {err}"),
        }
    }
}

pub fn new_account(email: &str) -> NewAccount {
    NewAccount {
        first_name: "Ada".to_string(),
        last_name: "Obi".to_string(),
        email: email.to_string(),
        password: "secret".to_string(),
    }
}

pub async fn seed_account(store: &dyn MetadataStore, email: &str) -> Account {
    let mut tx = store.begin().await.unwrap();
    let account = tx
        .insert_account(&new_account(email), "$argon2id$v=19$stub")
        .await
        .unwrap();
    tx.commit().await.unwrap();
    account
}

pub async fn seed_app(store: &dyn MetadataStore, account: &Account, name: &str) -> App {
    let mut tx = store.begin().await.unwrap();
    let app = tx
        .insert_app(&NewApp::new(name, account.id, account.email_username()))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    app
}

pub fn new_blob(app: &App, hash: &str, is_private: bool) -> NewBlob {
    NewBlob {
        app_id: app.id,
        hash: hash.to_string(),
        size: 42,
        content_type: "image/png".to_string(),
        filename: "pic.png".to_string(),
        app_name: app.name.clone(),
        is_private,
        download_url: format!("http://blober.test/{}/{hash}", app.namespace),
    }
}
