//! Apps, their namespaces, and the blobs stored in them.

use crate::error::{Error, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Longest namespace accepted by object storage bucket rules.
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Length of a blob token in hex characters.
pub const BLOB_HASH_LEN: usize = 32;

/// An app owned by one account. Each app has its own storage namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: i64,
    pub name: String,
    pub account_id: i64,
    pub namespace: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Input for creating an app.
#[derive(Clone, Debug)]
pub struct NewApp {
    pub name: String,
    pub account_id: i64,
    pub namespace: String,
}

impl NewApp {
    /// Build an app for `account_id`, deriving its namespace from the owner's
    /// email local part and id.
    pub fn new(name: impl Into<String>, account_id: i64, email_username: &str) -> Self {
        let name = name.into();
        let namespace = derive_namespace(&name, email_username, account_id);
        Self {
            name,
            account_id,
            namespace,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::EmptyAppName);
        }
        if self.account_id <= 0 {
            return Err(Error::InvalidAccount);
        }
        Ok(())
    }
}

/// Derive the storage namespace of an app.
///
/// The result is `{name}-{email_username}-{account_id}`, lowercased and
/// reduced to `[a-z0-9-]` with runs of hyphens collapsed. The owner suffix
/// always ends in `-{account_id}`, so namespaces of different accounts never
/// collide. Only the name part (and, for very long local parts, the local
/// part) is shortened to fit [`MAX_NAMESPACE_LEN`].
pub fn derive_namespace(name: &str, email_username: &str, account_id: i64) -> String {
    let id = account_id.to_string();

    // Leave room for at least one name character and its hyphen.
    let local_budget = MAX_NAMESPACE_LEN.saturating_sub(id.len() + 3);
    let local = bucket_safe(email_username, local_budget);
    let owner = if local.is_empty() {
        id
    } else {
        format!("{local}-{id}")
    };

    let name_budget = MAX_NAMESPACE_LEN.saturating_sub(owner.len() + 1);
    let name = bucket_safe(name, name_budget);
    if name.is_empty() {
        owner
    } else {
        format!("{name}-{owner}")
    }
}

/// Lowercase `[a-z0-9-]` form of `raw` without edge or repeated hyphens,
/// at most `max_len` characters long.
fn bucket_safe(raw: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(raw.len().min(max_len));
    for c in raw.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }

    out.truncate(max_len);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// A stored file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub id: i64,
    pub app_id: i64,
    /// Random token, also the object key inside the namespace.
    pub hash: String,
    pub size: i64,
    pub content_type: String,
    #[serde(default)]
    pub filename: String,
    pub app_name: String,
    pub is_private: bool,
    pub download_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A blob about to be recorded.
#[derive(Clone, Debug)]
pub struct NewBlob {
    pub app_id: i64,
    pub hash: String,
    pub size: i64,
    pub content_type: String,
    pub filename: String,
    pub app_name: String,
    pub is_private: bool,
    pub download_url: String,
}

impl NewBlob {
    /// Describe an object stored under `hash` in `app`'s namespace.
    pub fn for_app(
        app: &App,
        hash: String,
        size: u64,
        content_type: String,
        filename: String,
        is_private: bool,
        public_base_url: &str,
    ) -> Self {
        let download_url = download_url(public_base_url, &app.namespace, &hash);
        Self {
            app_id: app.id,
            hash,
            size: i64::try_from(size).unwrap_or(i64::MAX),
            content_type,
            filename,
            app_name: app.name.clone(),
            is_private,
            download_url,
        }
    }
}

/// Public download URL of a blob.
pub fn download_url(public_base_url: &str, namespace: &str, hash: &str) -> String {
    format!(
        "{}/{}/{}",
        public_base_url.trim_end_matches('/'),
        namespace,
        hash
    )
}

/// Generate a random 32-hex-character blob token.
pub fn generate_blob_hash() -> String {
    let mut bytes = [0u8; BLOB_HASH_LEN / 2];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Blob cache key: lowercase namespace and hash joined by `/`.
///
/// Neither part can contain `/`, so distinct pairs never share a key.
pub fn blob_cache_key(namespace: &str, hash: &str) -> String {
    format!("{}/{}", namespace.to_lowercase(), hash)
}
