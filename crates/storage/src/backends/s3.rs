//! S3-compatible storage backend using AWS SDK.
//!
//! Each namespace maps to its own bucket, named `{bucket_prefix}{namespace}`.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectStore, validate_key, validate_namespace};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::future::ProvideCredentials as ProvideCredentialsFuture;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// Region in which S3 rejects an explicit location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Marker included in lazy-credentials errors so they can be reported as
/// configuration problems instead of generic S3 failures.
const CREDENTIALS_INIT_ERROR_MARKER: &str = "blober-s3-lazy-credentials-init";
const CREDENTIALS_RESOLVE_ERROR_MARKER: &str = "blober-s3-lazy-credentials-resolve";

/// Lazily initializes the AWS default credentials chain on first signed request.
#[derive(Debug)]
struct LazyDefaultCredentialsProvider {
    region: String,
    chain: OnceCell<aws_config::default_provider::credentials::DefaultCredentialsChain>,
}

impl LazyDefaultCredentialsProvider {
    fn new(region: String) -> Self {
        Self {
            region,
            chain: OnceCell::new(),
        }
    }

    async fn chain(
        &self,
    ) -> Result<&aws_config::default_provider::credentials::DefaultCredentialsChain, CredentialsError>
    {
        self.chain
            .get_or_try_init(|| async {
                let region = aws_config::Region::new(self.region.clone());
                tokio::task::spawn(async move {
                    aws_config::default_provider::credentials::DefaultCredentialsChain::builder()
                        .region(region)
                        .build()
                        .await
                })
                .await
                .map_err(|join_err| {
                    CredentialsError::provider_error(format!(
                        "{CREDENTIALS_INIT_ERROR_MARKER}: failed to initialize AWS default credential chain: {join_err}"
                    ))
                })
            })
            .await
    }

    async fn credentials(&self) -> aws_credential_types::provider::Result {
        let chain = self.chain().await?;
        chain.provide_credentials().await.map_err(|err| {
            CredentialsError::provider_error(format!(
                "{CREDENTIALS_RESOLVE_ERROR_MARKER}: default AWS credentials resolution failed: {err}"
            ))
        })
    }
}

impl ProvideCredentials for LazyDefaultCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> ProvideCredentialsFuture<'a>
    where
        Self: 'a,
    {
        ProvideCredentialsFuture::new(self.credentials())
    }
}

fn map_s3_operation_error<E>(err: SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let err_text = err.to_string();
    if err_text.contains(CREDENTIALS_INIT_ERROR_MARKER)
        || err_text.contains(CREDENTIALS_RESOLVE_ERROR_MARKER)
    {
        return StorageError::Config(
            "S3 credential initialization failed. Configure AWS credentials explicitly or ensure ambient AWS credentials and trust roots are available."
                .to_string(),
        );
    }

    StorageError::S3(Box::new(err))
}

/// Map a 404 (missing bucket or missing key) to `NotFound`.
fn map_sdk_error<E>(err: SdkError<E>, what: &str) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if is_not_found(&err) {
        return StorageError::NotFound(what.to_string());
    }
    map_s3_operation_error(err)
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() == 404)
}

/// S3-compatible object store using AWS SDK.
pub struct S3Backend {
    client: Client,
    bucket_prefix: String,
    region: String,
    endpoint: Option<String>,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket_prefix", &self.bucket_prefix)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// `force_path_style` selects `endpoint/bucket/key` URLs instead of
    /// `bucket.endpoint/key`; MinIO and most S3-compatible services need it.
    pub async fn new(
        endpoint: Option<String>,
        region: Option<String>,
        bucket_prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::Config(
                "s3 config requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let resolved_region = region.unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved_region.clone()));

        if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
            let credentials = aws_sdk_s3::config::Credentials::new(
                key_id,
                secret,
                None, // session token
                None, // expiration
                "blober-config",
            );
            s3_config_builder = s3_config_builder.credentials_provider(credentials);
        } else {
            s3_config_builder = s3_config_builder
                .credentials_provider(LazyDefaultCredentialsProvider::new(resolved_region.clone()));
        }

        // Bare host:port endpoints (e.g., "minio:9000") are taken as plain HTTP.
        let normalized_endpoint = endpoint.map(|endpoint_url| {
            let endpoint_lower = endpoint_url.to_lowercase();
            if endpoint_lower.starts_with("http://") || endpoint_lower.starts_with("https://") {
                endpoint_url
            } else {
                format!("http://{endpoint_url}")
            }
        });

        if let Some(endpoint_url) = &normalized_endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);

            // Plain HTTP endpoints don't need native trust roots.
            if endpoint_url.to_ascii_lowercase().starts_with("http://") {
                s3_config_builder =
                    s3_config_builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }

        if force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket_prefix: bucket_prefix.unwrap_or_default(),
            region: resolved_region,
            endpoint: normalized_endpoint,
        })
    }

    /// Bucket holding a namespace.
    fn bucket(&self, namespace: &str) -> StorageResult<String> {
        validate_namespace(namespace)?;
        Ok(format!("{}{}", self.bucket_prefix, namespace))
    }

    fn location_constraint(&self) -> Option<CreateBucketConfiguration> {
        if self.region == DEFAULT_REGION {
            return None;
        }
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build(),
        )
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn create_namespace(&self, namespace: &str) -> StorageResult<()> {
        let namespace_error = |reason: String| StorageError::Namespace {
            namespace: namespace.to_string(),
            reason,
        };

        let bucket = self.bucket(namespace).map_err(|e| namespace_error(e.to_string()))?;
        let result = self
            .client
            .create_bucket()
            .bucket(&bucket)
            .set_create_bucket_configuration(self.location_constraint())
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(bucket = %bucket, region = %self.region, "Created bucket");
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you()) =>
            {
                tracing::debug!(bucket = %bucket, "Bucket already owned by this service");
                Ok(())
            }
            Err(err) => match map_s3_operation_error(err) {
                config @ StorageError::Config(_) => Err(config),
                other => Err(namespace_error(other.to_string())),
            },
        }
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<u64> {
        let bucket = self.bucket(namespace)?;
        validate_key(key)?;

        let size = data.len() as u64;
        self.client
            .put_object()
            .bucket(&bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(data.into())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, namespace))?;

        Ok(size)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_stream(&self, namespace: &str, key: &str) -> StorageResult<ByteStream> {
        use futures::StreamExt;

        let bucket = self.bucket(namespace)?;
        validate_key(key)?;

        let output = self
            .client
            .get_object()
            .bucket(&bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{namespace}/{key}")))?;

        let reader_stream = ReaderStream::new(output.body.into_async_read());
        let stream = reader_stream.map(|result| result.map_err(StorageError::Io));

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let bucket = self.bucket(namespace)?;
        validate_key(key)?;

        match self
            .client
            .head_object()
            .bucket(&bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(map_s3_operation_error(err)),
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        // delete_object succeeds on missing keys, so check first to report NotFound.
        if !self.exists(namespace, key).await? {
            return Err(StorageError::NotFound(format!("{namespace}/{key}")));
        }

        let bucket = self.bucket(namespace)?;
        self.client
            .delete_object()
            .bucket(&bucket)
            .key(key)
            .send()
            .await
            .map_err(map_s3_operation_error)?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> StorageResult<()> {
        const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

        let probe = async {
            self.client
                .list_buckets()
                .send()
                .await
                .map_err(map_s3_operation_error)?;
            Ok::<(), StorageError>(())
        };

        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, probe)
            .await
            .map_err(|_| {
                StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "S3 health check timed out after 10 seconds",
                ))
            })?
    }
}
