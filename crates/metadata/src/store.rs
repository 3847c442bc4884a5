//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataResult, unique_violation};
use crate::models::{AccountRow, AppRow, BlobRow};
use crate::repos::{AccountRepo, AppRepo, BlobRepo};
use async_trait::async_trait;
use blober_core::{Account, App, BLOB_PAGE_SIZE, Blob, NewAccount, NewApp, NewBlob};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: AccountRepo + AppRepo + BlobRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Start a transaction for multi-step writes.
    async fn begin(&self) -> MetadataResult<Box<dyn MetadataTransaction>>;
}

/// Writes that must land together or not at all.
///
/// Dropping the transaction without calling `commit` rolls it back.
#[async_trait]
pub trait MetadataTransaction: Send {
    /// Insert an account whose password has already been hashed.
    async fn insert_account(
        &mut self,
        account: &NewAccount,
        password_hash: &str,
    ) -> MetadataResult<Account>;

    async fn insert_app(&mut self, app: &NewApp) -> MetadataResult<App>;

    async fn commit(self: Box<Self>) -> MetadataResult<()>;

    async fn rollback(self: Box<Self>) -> MetadataResult<()>;
}

/// Clamp a page number to a row offset.
pub(crate) fn page_offset(page: i64) -> i64 {
    page.max(0).saturating_mul(BLOB_PAGE_SIZE)
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // One writer at a time; avoids "database is locked" under axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::info!(path = %path.display(), "SQLite metadata store ready");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> MetadataResult<Box<dyn MetadataTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

#[async_trait]
impl AccountRepo for SqliteStore {
    async fn find_account_by_email(&self, email: &str) -> MetadataResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE email = ? AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn find_account_by_id(&self, id: i64) -> MetadataResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }
}

#[async_trait]
impl AppRepo for SqliteStore {
    async fn find_app_by_id(&self, id: i64) -> MetadataResult<Option<App>> {
        let row =
            sqlx::query_as::<_, AppRow>("SELECT * FROM apps WHERE id = ? AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(App::from))
    }

    async fn find_app_by_name(&self, account_id: i64, name: &str) -> MetadataResult<Option<App>> {
        let row = sqlx::query_as::<_, AppRow>(
            "SELECT * FROM apps WHERE account_id = ? AND name = ? AND deleted_at IS NULL",
        )
        .bind(account_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(App::from))
    }

    async fn find_app_by_namespace(&self, namespace: &str) -> MetadataResult<Option<App>> {
        let row = sqlx::query_as::<_, AppRow>(
            "SELECT * FROM apps WHERE namespace = ? AND deleted_at IS NULL",
        )
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(App::from))
    }

    async fn list_apps(&self, account_id: i64) -> MetadataResult<Vec<App>> {
        let rows = sqlx::query_as::<_, AppRow>(
            "SELECT * FROM apps WHERE account_id = ? AND deleted_at IS NULL ORDER BY id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(App::from).collect())
    }
}

#[async_trait]
impl BlobRepo for SqliteStore {
    async fn find_blob(&self, app_id: i64, hash: &str) -> MetadataResult<Option<Blob>> {
        let row = sqlx::query_as::<_, BlobRow>(
            "SELECT * FROM blobs WHERE app_id = ? AND hash = ? AND deleted_at IS NULL",
        )
        .bind(app_id)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Blob::from))
    }

    async fn list_blobs(&self, app_id: i64, page: i64) -> MetadataResult<Vec<Blob>> {
        let rows = sqlx::query_as::<_, BlobRow>(
            r#"
            SELECT * FROM blobs
            WHERE app_id = ? AND deleted_at IS NULL
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(app_id)
        .bind(BLOB_PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Blob::from).collect())
    }

    async fn insert_blob(&self, blob: &NewBlob) -> MetadataResult<Blob> {
        let now = OffsetDateTime::now_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO blobs (app_id, hash, size, content_type, filename, app_name, is_private, download_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(blob.app_id)
        .bind(&blob.hash)
        .bind(blob.size)
        .bind(&blob.content_type)
        .bind(&blob.filename)
        .bind(&blob.app_name)
        .bind(blob.is_private)
        .bind(&blob.download_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, format!("blob {} in app {}", blob.hash, blob.app_id)))?;

        let row = sqlx::query_as::<_, BlobRow>("SELECT * FROM blobs WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }
}

/// Open SQLite transaction. Rolled back by sqlx on drop unless committed.
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl MetadataTransaction for SqliteTransaction {
    async fn insert_account(
        &mut self,
        account: &NewAccount,
        password_hash: &str,
    ) -> MetadataResult<Account> {
        let now = OffsetDateTime::now_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (first_name, last_name, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.email)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, format!("account with email {}", account.email)))?;

        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn insert_app(&mut self, app: &NewApp) -> MetadataResult<App> {
        let now = OffsetDateTime::now_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO apps (name, account_id, namespace, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&app.name)
        .bind(app.account_id)
        .bind(&app.namespace)
        .bind(now)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, format!("app {} (namespace {})", app.name, app.namespace)))?;

        let row = sqlx::query_as::<_, AppRow>("SELECT * FROM apps WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn commit(self: Box<Self>) -> MetadataResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MetadataResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS apps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    account_id INTEGER NOT NULL REFERENCES accounts(id),
    namespace TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    UNIQUE (account_id, name)
);
CREATE INDEX IF NOT EXISTS idx_apps_account ON apps(account_id);

CREATE TABLE IF NOT EXISTS blobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    app_id INTEGER NOT NULL REFERENCES apps(id),
    hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    filename TEXT NOT NULL DEFAULT '',
    app_name TEXT NOT NULL,
    is_private INTEGER NOT NULL DEFAULT 0,
    download_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    UNIQUE (app_id, hash)
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("blober.db")).await.unwrap();
        (dir, store)
    }

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            first_name: "Lekan".to_string(),
            last_name: "Hammed".to_string(),
            email: email.to_string(),
            password: "secret".to_string(),
        }
    }

    async fn seed_account(store: &SqliteStore, email: &str) -> Account {
        let mut tx = store.begin().await.unwrap();
        let account = tx
            .insert_account(&new_account(email), "$argon2id$stub")
            .await
            .unwrap();
        tx.commit().await.unwrap();
        account
    }

    async fn seed_app(store: &SqliteStore, account: &Account, name: &str) -> App {
        let mut tx = store.begin().await.unwrap();
        let app = tx
            .insert_app(&NewApp::new(name, account.id, account.email_username()))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        app
    }

    fn new_blob(app: &App, hash: &str) -> NewBlob {
        NewBlob {
            app_id: app.id,
            hash: hash.to_string(),
            size: 5,
            content_type: "text/plain; charset=utf-8".to_string(),
            filename: "a.txt".to_string(),
            app_name: app.name.clone(),
            is_private: false,
            download_url: format!("http://blober.test/{}/{hash}", app.namespace),
        }
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(0), 0);
        assert_eq!(page_offset(3), 60);
        assert_eq!(page_offset(-2), 0);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let (_dir, store) = store().await;
        store.migrate().await.unwrap();
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_account_insert_and_lookup() {
        let (_dir, store) = store().await;
        let account = seed_account(&store, "lekan@example.com").await;

        assert!(account.id > 0);
        assert!(account.credential.is_none());
        let by_email = store
            .find_account_by_email("lekan@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, account.id);
        assert_eq!(by_email.password_hash, "$argon2id$stub");
        assert!(store.find_account_by_id(account.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_already_exists() {
        let (_dir, store) = store().await;
        seed_account(&store, "dup@example.com").await;

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_account(&new_account("dup@example.com"), "h")
            .await
            .unwrap_err();
        assert!(err.is_already_exists(), "{err:?}");
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let (_dir, store) = store().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_account(&new_account("gone@example.com"), "h")
                .await
                .unwrap();
        }
        assert!(
            store
                .find_account_by_email("gone@example.com")
                .await
                .unwrap()
                .is_none()
        );

        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&new_account("gone@example.com"), "h")
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        assert!(
            store
                .find_account_by_email("gone@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_app_names_are_scoped_per_account() {
        let (_dir, store) = store().await;
        let alice = seed_account(&store, "alice@example.com").await;
        let bob = seed_account(&store, "bob@example.com").await;

        let a = seed_app(&store, &alice, "foo").await;
        let b = seed_app(&store, &bob, "foo").await;
        assert_ne!(a.namespace, b.namespace);

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_app(&NewApp::new("foo", alice.id, alice.email_username()))
            .await
            .unwrap_err();
        assert!(err.is_already_exists(), "{err:?}");
        drop(tx);

        assert_eq!(
            store.find_app_by_name(bob.id, "foo").await.unwrap().unwrap().id,
            b.id
        );
        assert_eq!(
            store
                .find_app_by_namespace(&a.namespace)
                .await
                .unwrap()
                .unwrap()
                .account_id,
            alice.id
        );
        assert_eq!(store.list_apps(alice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blob_insert_find_and_paging() {
        let (_dir, store) = store().await;
        let account = seed_account(&store, "pager@example.com").await;
        let app = seed_app(&store, &account, "photos").await;

        for i in 0..25 {
            store
                .insert_blob(&new_blob(&app, &format!("{i:032x}")))
                .await
                .unwrap();
        }

        let first = store.list_blobs(app.id, 0).await.unwrap();
        let second = store.list_blobs(app.id, 1).await.unwrap();
        assert_eq!(first.len(), 20);
        assert_eq!(second.len(), 5);
        assert!(first.windows(2).all(|w| w[0].id < w[1].id));
        assert!(first.last().unwrap().id < second[0].id);
        assert!(store.list_blobs(app.id, 2).await.unwrap().is_empty());

        let blob = store
            .find_blob(app.id, &format!("{:032x}", 7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(blob.app_name, "photos");
        assert!(!blob.is_private);

        let err = store
            .insert_blob(&new_blob(&app, &format!("{:032x}", 7)))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }
}
