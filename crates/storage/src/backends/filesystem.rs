//! Local filesystem storage backend.
//!
//! Layout: `{root}/{namespace}/{key}`. Namespaces are plain directories.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectStore, validate_key, validate_namespace};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
}

fn not_found_or_io(e: std::io::Error, what: String) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(what)
    } else {
        StorageError::Io(e)
    }
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Directory holding a namespace, with traversal protection.
    async fn namespace_path(&self, namespace: &str) -> StorageResult<PathBuf> {
        validate_namespace(namespace)?;
        self.checked_path(namespace.to_string()).await
    }

    /// Path of an object, with traversal protection.
    async fn object_path(&self, namespace: &str, key: &str) -> StorageResult<PathBuf> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        self.checked_path(format!("{namespace}/{key}")).await
    }

    /// Resolve a relative path under the root on the blocking pool.
    async fn checked_path(&self, rel: String) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::checked_path_sync(&root, &rel))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Reject paths that resolve outside the root through symlinks.
    ///
    /// Names are already restricted to safe characters, so only existing
    /// entries (the namespace directory or the object itself) can redirect.
    fn checked_path_sync(root: &Path, rel: &str) -> StorageResult<PathBuf> {
        let path = root.join(rel);

        let root_canonical = root.canonicalize().map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to canonicalize root: {e}"),
            ))
        })?;

        let mut probe = Some(path.as_path());
        while let Some(current) = probe {
            if current == root {
                break;
            }
            match std::fs::symlink_metadata(current) {
                Ok(meta) => {
                    let canonical = current.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidKey(format!(
                                "symlink target missing or invalid: {rel}"
                            ))
                        } else {
                            StorageError::Io(std::io::Error::new(
                                e.kind(),
                                format!("failed to canonicalize path: {e}"),
                            ))
                        }
                    })?;
                    if !canonical.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "resolved path escapes storage root: {rel}"
                        )));
                    }
                    break;
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(StorageError::Io(std::io::Error::new(
                        err.kind(),
                        format!("failed to stat path: {err}"),
                    )));
                }
            }
            probe = current.parent();
        }

        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn create_namespace(&self, namespace: &str) -> StorageResult<()> {
        let dir = self
            .namespace_path(namespace)
            .await
            .map_err(|e| StorageError::Namespace {
                namespace: namespace.to_string(),
                reason: e.to_string(),
            })?;

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::Namespace {
                namespace: namespace.to_string(),
                reason: e.to_string(),
            })
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<u64> {
        let dir = self.namespace_path(namespace).await?;
        if !fs::try_exists(&dir).await? {
            return Err(StorageError::NotFound(namespace.to_string()));
        }
        let path = self.object_path(namespace, key).await?;

        // Write to a uniquely named temp file, fsync, then rename so readers
        // never observe a partial object.
        let temp_path = dir.join(format!(".tmp.{}", Uuid::new_v4()));
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Ok(data.len() as u64)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, namespace: &str, key: &str) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.object_path(namespace, key).await?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(e, format!("{namespace}/{key}")))?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let path = self.object_path(namespace, key).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        let path = self.object_path(namespace, key).await?;
        fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(e, format!("{namespace}/{key}")))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}
