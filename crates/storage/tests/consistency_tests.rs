// Consistency of concurrent writers and readers on the filesystem backend.

mod common;

use blober_storage::{FilesystemBackend, ObjectStore};
use bytes::Bytes;
use common::{collect_stream, seeded_bytes, sha256_hash};
use std::sync::Arc;
use tempfile::TempDir;

async fn backend(temp_dir: &TempDir) -> Arc<FilesystemBackend> {
    Arc::new(FilesystemBackend::new(temp_dir.path()).await.unwrap())
}

#[tokio::test]
async fn test_concurrent_writes_to_distinct_keys() {
    let temp_dir = TempDir::new().unwrap();
    let backend = backend(&temp_dir).await;
    backend.create_namespace("photos-ade1").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..32u64 {
        let backend = backend.clone();
        handles.push(tokio::spawn(async move {
            let data = seeded_bytes(i, 10_000 + i as usize);
            backend
                .put("photos-ade1", &format!("blob{i}"), data, "application/octet-stream")
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..32u64 {
        let stream = backend
            .get_stream("photos-ade1", &format!("blob{i}"))
            .await
            .unwrap();
        let data = collect_stream(stream).await;
        assert_eq!(
            sha256_hash(&data),
            sha256_hash(&seeded_bytes(i, 10_000 + i as usize))
        );
    }
}

#[tokio::test]
async fn test_concurrent_writes_to_same_key_leave_one_whole_object() {
    let temp_dir = TempDir::new().unwrap();
    let backend = backend(&temp_dir).await;
    backend.create_namespace("photos").await.unwrap();

    let payloads: Vec<Bytes> = (0..8).map(|seed| seeded_bytes(seed, 256 * 1024)).collect();
    let mut handles = Vec::new();
    for payload in payloads.clone() {
        let backend = backend.clone();
        handles.push(tokio::spawn(async move {
            backend
                .put("photos", "same", payload, "application/octet-stream")
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // The survivor must be exactly one of the payloads, never a mix.
    let data = collect_stream(backend.get_stream("photos", "same").await.unwrap()).await;
    assert!(payloads.iter().any(|p| &p[..] == data.as_slice()));
}

#[tokio::test]
async fn test_concurrent_namespace_creation() {
    let temp_dir = TempDir::new().unwrap();
    let backend = backend(&temp_dir).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let backend = backend.clone();
            tokio::spawn(async move { backend.create_namespace("shared").await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert!(temp_dir.path().join("shared").is_dir());
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let backend = backend(&temp_dir).await;
    backend.create_namespace("one").await.unwrap();
    backend.create_namespace("two").await.unwrap();

    backend
        .put("one", "key", Bytes::from_static(b"first"), "text/plain")
        .await
        .unwrap();

    assert!(backend.exists("one", "key").await.unwrap());
    assert!(!backend.exists("two", "key").await.unwrap());
    assert!(
        backend
            .get_stream("two", "key")
            .await
            .err()
            .unwrap()
            .is_not_found()
    );
}
