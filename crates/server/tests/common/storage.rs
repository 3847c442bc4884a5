//! Fault-injecting object store.

use async_trait::async_trait;
use blober_storage::{ByteStream, ObjectStore, StorageError, StorageResult};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Payloads starting with this marker are refused by [`FlakyStore`].
#[allow(dead_code)]
pub const FAIL_MARKER: &[u8] = b"FAIL";

/// Wraps a real store and fails selected operations.
#[allow(dead_code)]
pub struct FlakyStore {
    inner: Arc<dyn ObjectStore>,
    fail_namespaces: bool,
    fail_reads: bool,
    pub failed_puts: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    /// Fail every `put` whose payload starts with [`FAIL_MARKER`].
    pub fn failing_marked_puts(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            fail_namespaces: false,
            fail_reads: false,
            failed_puts: AtomicUsize::new(0),
        }
    }

    /// Also refuse every namespace creation.
    pub fn failing_namespaces(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            fail_namespaces: true,
            ..Self::failing_marked_puts(inner)
        }
    }

    /// Also fail every read with a transport-style error.
    pub fn failing_reads(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            fail_reads: true,
            ..Self::failing_marked_puts(inner)
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn create_namespace(&self, namespace: &str) -> StorageResult<()> {
        if self.fail_namespaces {
            return Err(StorageError::Namespace {
                namespace: namespace.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.create_namespace(namespace).await
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<u64> {
        if data.starts_with(FAIL_MARKER) {
            self.failed_puts.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Io(std::io::Error::other("injected put failure")));
        }
        self.inner.put(namespace, key, data, content_type).await
    }

    async fn get_stream(&self, namespace: &str, key: &str) -> StorageResult<ByteStream> {
        if self.fail_reads {
            return Err(StorageError::Io(std::io::Error::other("injected read failure")));
        }
        self.inner.get_stream(namespace, key).await
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.inner.exists(namespace, key).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        self.inner.delete(namespace, key).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}
