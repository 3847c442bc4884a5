//! Database rows mapping to the metadata schema.

use blober_core::{Account, App, Blob};
use sqlx::FromRow;
use time::OffsetDateTime;

// =============================================================================
// Accounts
// =============================================================================

/// Account record. The credential lives in the session cache, not here.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            credential: None,
        }
    }
}

// =============================================================================
// Apps
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct AppRow {
    pub id: i64,
    pub name: String,
    pub account_id: i64,
    pub namespace: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl From<AppRow> for App {
    fn from(row: AppRow) -> Self {
        App {
            id: row.id,
            name: row.name,
            account_id: row.account_id,
            namespace: row.namespace,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Blobs
// =============================================================================

/// Blob record. `app_name` and `download_url` are denormalized at upload time.
#[derive(Debug, Clone, FromRow)]
pub struct BlobRow {
    pub id: i64,
    pub app_id: i64,
    pub hash: String,
    pub size: i64,
    pub content_type: String,
    pub filename: String,
    pub app_name: String,
    pub is_private: bool,
    pub download_url: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl From<BlobRow> for Blob {
    fn from(row: BlobRow) -> Self {
        Blob {
            id: row.id,
            app_id: row.app_id,
            hash: row.hash,
            size: row.size,
            content_type: row.content_type,
            filename: row.filename,
            app_name: row.app_name,
            is_private: row.is_private,
            download_url: row.download_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
