//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Longest namespace name a backend accepts.
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Namespaced object store.
///
/// Every app owns one namespace (a directory or a bucket) and objects are
/// addressed by `(namespace, key)`. Callers buffer whole payloads before
/// calling [`ObjectStore::put`].
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Create a namespace.
    ///
    /// Creating a namespace this service already owns succeeds. Any other
    /// refusal by the backend is reported as [`StorageError::Namespace`].
    async fn create_namespace(&self, namespace: &str) -> StorageResult<()>;

    /// Store an object, replacing any existing object under the same key.
    ///
    /// Returns the number of bytes stored.
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<u64>;

    /// Get an object as a byte stream.
    ///
    /// Fails with [`StorageError::NotFound`] when the namespace or the
    /// object does not exist.
    async fn get_stream(&self, namespace: &str, key: &str) -> StorageResult<ByteStream>;

    /// Check if an object exists.
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Delete an object.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()>;

    /// Get the name of this storage backend (e.g., "s3", "filesystem").
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// Called during server startup. The default implementation returns
    /// `Ok(())`, suitable for backends without a remote dependency.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Check that a namespace is a lowercase bucket-style name.
pub fn validate_namespace(namespace: &str) -> StorageResult<()> {
    let valid = !namespace.is_empty()
        && namespace.len() <= MAX_NAMESPACE_LEN
        && namespace
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !namespace.starts_with('-')
        && !namespace.ends_with('-');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(format!(
            "invalid namespace: {namespace:?}"
        )))
    }
}

/// Check that an object key is a single safe path segment.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && !key.starts_with(".tmp.")
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(format!("invalid object key: {key:?}")))
    }
}
