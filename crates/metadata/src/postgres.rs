//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataResult, unique_violation};
use crate::models::{AccountRow, AppRow, BlobRow};
use crate::repos::{AccountRepo, AppRepo, BlobRepo};
use crate::store::{MetadataStore, MetadataTransaction, page_offset};
use async_trait::async_trait;
use blober_core::config::PgSslMode;
use blober_core::{Account, App, BLOB_PAGE_SIZE, Blob, NewAccount, NewApp, NewBlob};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres, Transaction};
use std::str::FromStr;
use time::OffsetDateTime;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connect with a full connection URL.
    pub async fn from_url(url: &str, max_connections: u32) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections).await
    }

    /// Connect with individual parameters, so the password can come from
    /// its own environment variable.
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections).await
    }

    async fn connect(opts: PgConnectOptions, max_connections: u32) -> MetadataResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Prepared statements hold a single command each.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> MetadataResult<Box<dyn MetadataTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

#[async_trait]
impl AccountRepo for PostgresStore {
    async fn find_account_by_email(&self, email: &str) -> MetadataResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE email = $1 AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn find_account_by_id(&self, id: i64) -> MetadataResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }
}

#[async_trait]
impl AppRepo for PostgresStore {
    async fn find_app_by_id(&self, id: i64) -> MetadataResult<Option<App>> {
        let row =
            sqlx::query_as::<_, AppRow>("SELECT * FROM apps WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(App::from))
    }

    async fn find_app_by_name(&self, account_id: i64, name: &str) -> MetadataResult<Option<App>> {
        let row = sqlx::query_as::<_, AppRow>(
            "SELECT * FROM apps WHERE account_id = $1 AND name = $2 AND deleted_at IS NULL",
        )
        .bind(account_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(App::from))
    }

    async fn find_app_by_namespace(&self, namespace: &str) -> MetadataResult<Option<App>> {
        let row = sqlx::query_as::<_, AppRow>(
            "SELECT * FROM apps WHERE namespace = $1 AND deleted_at IS NULL",
        )
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(App::from))
    }

    async fn list_apps(&self, account_id: i64) -> MetadataResult<Vec<App>> {
        let rows = sqlx::query_as::<_, AppRow>(
            "SELECT * FROM apps WHERE account_id = $1 AND deleted_at IS NULL ORDER BY id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(App::from).collect())
    }
}

#[async_trait]
impl BlobRepo for PostgresStore {
    async fn find_blob(&self, app_id: i64, hash: &str) -> MetadataResult<Option<Blob>> {
        let row = sqlx::query_as::<_, BlobRow>(
            "SELECT * FROM blobs WHERE app_id = $1 AND hash = $2 AND deleted_at IS NULL",
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
            WHERE app_id = $1 AND deleted_at IS NULL
            ORDER BY id
            LIMIT $2 OFFSET $3
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
        let row = sqlx::query_as::<_, BlobRow>(
            r#"
            INSERT INTO blobs (app_id, hash, size, content_type, filename, app_name, is_private, download_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
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
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, format!("blob {} in app {}", blob.hash, blob.app_id)))?;
        Ok(row.into())
    }
}

/// Open PostgreSQL transaction. Rolled back by sqlx on drop unless committed.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MetadataTransaction for PgTransaction {
    async fn insert_account(
        &mut self,
        account: &NewAccount,
        password_hash: &str,
    ) -> MetadataResult<Account> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (first_name, last_name, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.email)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, format!("account with email {}", account.email)))?;
        Ok(row.into())
    }

    async fn insert_app(&mut self, app: &NewApp) -> MetadataResult<App> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, AppRow>(
            r#"
            INSERT INTO apps (name, account_id, namespace, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&app.name)
        .bind(app.account_id)
        .bind(&app.namespace)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, format!("app {} (namespace {})", app.name, app.namespace)))?;
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
