// S3 backend against a throwaway MinIO container.
// Skipped when SKIP_S3_TESTS is set or when no container runtime is available.

mod common;

use blober_storage::{ObjectStore, S3Backend, StorageError};
use bytes::Bytes;
use common::{collect_stream, seeded_bytes};
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::{ContainerAsync, GenericImage, ImageExt, runners::AsyncRunner};

const MINIO_IMAGE: &str = "minio/minio";
const MINIO_TAG: &str = "RELEASE.2024-02-12T21-36-45Z";

fn should_skip_s3_tests() -> bool {
    std::env::var("SKIP_S3_TESTS").is_ok()
}

struct S3TestHarness {
    _container: ContainerAsync<GenericImage>,
    backend: S3Backend,
}

impl S3TestHarness {
    async fn new(bucket_prefix: Option<&str>) -> Result<Self, String> {
        let access_key = "minio-access-key".to_string();
        let secret_key = "minio-secret-key".to_string();

        let container: ContainerAsync<GenericImage> = GenericImage::new(MINIO_IMAGE, MINIO_TAG)
            .with_exposed_port(9000.tcp())
            .with_wait_for(WaitFor::message_on_stdout("API:"))
            .with_env_var("MINIO_ROOT_USER", access_key.clone())
            .with_env_var("MINIO_ROOT_PASSWORD", secret_key.clone())
            .with_cmd(vec!["server", "/data"])
            .start()
            .await
            .map_err(|e| format!("failed to start MinIO container: {e}"))?;

        let host = container
            .get_host()
            .await
            .map_err(|e| format!("failed to get host: {e}"))?;
        let port = container
            .get_host_port_ipv4(9000.tcp())
            .await
            .map_err(|e| format!("failed to get port: {e}"))?;

        let backend = S3Backend::new(
            Some(format!("http://{host}:{port}")),
            Some("us-east-1".to_string()),
            bucket_prefix.map(str::to_string),
            Some(access_key),
            Some(secret_key),
            true,
        )
        .await
        .map_err(|e| format!("failed to create S3 backend: {e}"))?;

        Ok(Self {
            _container: container,
            backend,
        })
    }
}

macro_rules! harness_or_skip {
    ($prefix:expr) => {{
        if should_skip_s3_tests() {
            return;
        }
        match S3TestHarness::new($prefix).await {
            Ok(harness) => harness,
            Err(err) => {
                eprintln!("Skipping S3 test: {err}");
                return;
            }
        }
    }};
}

#[tokio::test]
async fn test_s3_namespace_put_get_delete() {
    let harness = harness_or_skip!(Some("blober-"));
    let backend = &harness.backend;

    backend.create_namespace("photos-ade1").await.unwrap();
    // Owned bucket: creating again succeeds.
    backend.create_namespace("photos-ade1").await.unwrap();

    let data = seeded_bytes(7, 300 * 1024);
    let size = backend
        .put("photos-ade1", "deadbeef", data.clone(), "image/png")
        .await
        .unwrap();
    assert_eq!(size, data.len() as u64);
    assert!(backend.exists("photos-ade1", "deadbeef").await.unwrap());

    let stream = backend.get_stream("photos-ade1", "deadbeef").await.unwrap();
    assert_eq!(collect_stream(stream).await, &data[..]);

    backend.delete("photos-ade1", "deadbeef").await.unwrap();
    assert!(!backend.exists("photos-ade1", "deadbeef").await.unwrap());
    assert!(
        backend
            .delete("photos-ade1", "deadbeef")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_s3_missing_bucket_is_not_found() {
    let harness = harness_or_skip!(None);
    let backend = &harness.backend;

    let err = backend.get_stream("never-created", "key").await.err().unwrap();
    assert!(err.is_not_found(), "unexpected error: {err:?}");

    let err = backend
        .put("never-created", "key", Bytes::from_static(b"x"), "text/plain")
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_s3_rejects_invalid_bucket_name() {
    let harness = harness_or_skip!(None);

    // Too short for S3 bucket rules, accepted by the local validator.
    let err = harness.backend.create_namespace("ab").await.unwrap_err();
    assert!(matches!(err, StorageError::Namespace { .. }), "{err:?}");
}

#[tokio::test]
async fn test_s3_health_check() {
    let harness = harness_or_skip!(None);
    harness.backend.health_check().await.unwrap();
}
