//! Account, app and blob operations behind the HTTP handlers.
//!
//! [`BloberService`] owns no state of its own: every store is injected as a
//! trait object, so tests can swap any of them for a fault-injecting fake.

use crate::error::{ApiError, ApiResult};
use blober_cache::{BlobStore, SessionStore};
use blober_core::account::{hash_password, verify_password};
use blober_core::app::generate_blob_hash;
use blober_core::credential::session_key_of;
use blober_core::sniff::detect_content_type;
use blober_core::{Account, AccountView, App, Blob, Credential, KeyRole, NewAccount, NewApp, NewBlob};
use blober_metadata::{MetadataError, MetadataStore};
use blober_storage::{ByteStream, ObjectStore};
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;

pub const DUPLICATE_EMAIL_MESSAGE: &str =
    "an account is already linked with that email. Please use a different email address and retry";
pub const INVALID_LOGIN_MESSAGE: &str = "invalid email and password combination";
pub const DUPLICATE_APP_MESSAGE: &str = "an app with that name already exists";
pub const NAMESPACE_TAKEN_MESSAGE: &str =
    "an app with a similar name already exists. Please use a different name and retry";
pub const ACCOUNT_NOT_FOUND_MESSAGE: &str = "user account not found";
pub const APP_NOT_FOUND_MESSAGE: &str = "app not found";
pub const BLOB_NOT_FOUND_MESSAGE: &str = "blob not found";

/// Which keys an operation accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Only the private key.
    Private,
    /// Either key of the credential.
    Any,
}

/// The account behind a presented key.
#[derive(Clone, Debug)]
pub struct Caller {
    pub account: Account,
    pub role: KeyRole,
}

/// One file received for upload.
#[derive(Clone, Debug)]
pub struct FileUpload {
    pub filename: String,
    pub data: Bytes,
}

/// Outcome of a batch upload.
#[derive(Debug, Serialize)]
pub struct BatchUpload {
    pub success_count: usize,
    pub failure_count: usize,
    pub blobs: Vec<Blob>,
}

/// A blob ready to be streamed to the client.
pub struct Download {
    pub blob: Blob,
    pub stream: ByteStream,
}

/// Orchestrates the relational store, both caches and object storage.
pub struct BloberService {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
    sessions: Arc<dyn SessionStore>,
    blobs: Arc<dyn BlobStore>,
    public_base_url: String,
    upload_concurrency: usize,
}

impl BloberService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStore>,
        sessions: Arc<dyn SessionStore>,
        blobs: Arc<dyn BlobStore>,
        public_base_url: impl Into<String>,
        upload_concurrency: usize,
    ) -> Self {
        Self {
            metadata,
            storage,
            sessions,
            blobs,
            public_base_url: public_base_url.into(),
            upload_concurrency: upload_concurrency.max(1),
        }
    }

    /// Map a presented key to its account.
    ///
    /// Every failure (missing, too short, unknown session, wrong key,
    /// expired credential, public key where a private one is needed) is
    /// reported as `Unauthorized`. Only cache faults surface as errors.
    pub async fn resolve_caller(&self, key: Option<&str>, access: Access) -> ApiResult<Caller> {
        let key = key.ok_or(ApiError::Unauthorized)?;
        let session_key = session_key_of(key).ok_or(ApiError::Unauthorized)?;

        let account = match self.sessions.get(session_key).await {
            Ok(account) => account,
            Err(e) if e.is_not_found() => return Err(ApiError::Unauthorized),
            Err(e) => return Err(e.into()),
        };

        let credential = account.credential.as_ref().ok_or(ApiError::Unauthorized)?;
        let role = credential.role_of(key).ok_or(ApiError::Unauthorized)?;
        if credential.is_expired(OffsetDateTime::now_utc()) {
            tracing::debug!(account_id = account.id, "Rejected expired credential");
            return Err(ApiError::Unauthorized);
        }
        if access == Access::Private && role != KeyRole::Private {
            return Err(ApiError::Unauthorized);
        }

        Ok(Caller { account, role })
    }

    /// Register a new account and log it in.
    pub async fn create_account(&self, input: NewAccount) -> ApiResult<AccountView> {
        if self
            .metadata
            .find_account_by_email(&input.email)
            .await?
            .is_some()
        {
            return Err(ApiError::Rejected(DUPLICATE_EMAIL_MESSAGE.to_string()));
        }
        input.validate()?;

        let password = input.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))??;

        let mut tx = self.metadata.begin().await?;
        let mut account = match tx.insert_account(&input, &password_hash).await {
            Ok(account) => account,
            Err(e) if e.is_already_exists() => {
                return Err(ApiError::Rejected(DUPLICATE_EMAIL_MESSAGE.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let credential = Credential::issue();
        let session_key = credential.session_key().to_string();
        account.credential = Some(credential);

        if let Err(e) = self.sessions.put(&session_key, &account).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    email = %account.email,
                    error = %rollback_err,
                    "Failed to roll back account after session write failure"
                );
            }
            return Err(e.into());
        }

        if let Err(e) = tx.commit().await {
            // The session points at an account id that never became visible.
            tracing::warn!(
                email = %account.email,
                session_key = %session_key,
                error = %e,
                "Account commit failed after session write; session left to expire"
            );
            return Err(e.into());
        }

        tracing::info!(account_id = account.id, "Account created");
        Ok(account.view())
    }

    /// Log in with email and password, issuing a fresh credential.
    pub async fn authenticate(&self, email: &str, password: &str) -> ApiResult<AccountView> {
        let invalid = || ApiError::Rejected(INVALID_LOGIN_MESSAGE.to_string());

        let mut account = self
            .metadata
            .find_account_by_email(email)
            .await?
            .ok_or_else(invalid)?;

        let password = password.to_string();
        let hash = account.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| ApiError::Internal(format!("password verification task failed: {e}")))??;
        if !verified {
            return Err(invalid());
        }

        let credential = Credential::issue();
        let session_key = credential.session_key().to_string();
        account.credential = Some(credential);
        self.sessions.put(&session_key, &account).await?;

        tracing::info!(account_id = account.id, "Account authenticated");
        Ok(account.view())
    }

    /// Create an app and its storage namespace for the caller.
    pub async fn create_app(&self, caller: &Caller, name: &str) -> ApiResult<App> {
        let account_id = caller.account.id;
        if self
            .metadata
            .find_app_by_name(account_id, name)
            .await?
            .is_some()
        {
            return Err(ApiError::Rejected(DUPLICATE_APP_MESSAGE.to_string()));
        }

        let new_app = NewApp::new(name, account_id, caller.account.email_username());
        new_app.validate()?;

        if self.metadata.find_account_by_id(account_id).await?.is_none() {
            return Err(ApiError::Rejected(ACCOUNT_NOT_FOUND_MESSAGE.to_string()));
        }

        if self
            .metadata
            .find_app_by_namespace(&new_app.namespace)
            .await?
            .is_some()
        {
            return Err(ApiError::Rejected(NAMESPACE_TAKEN_MESSAGE.to_string()));
        }

        let mut tx = self.metadata.begin().await?;
        let app = match tx.insert_app(&new_app).await {
            Ok(app) => app,
            Err(e) if e.is_already_exists() => {
                // Lost a race; tell the two unique constraints apart.
                drop(tx);
                let by_name = self.metadata.find_app_by_name(account_id, name).await?;
                let message = if by_name.is_some() {
                    DUPLICATE_APP_MESSAGE
                } else {
                    NAMESPACE_TAKEN_MESSAGE
                };
                return Err(ApiError::Rejected(message.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.storage.create_namespace(&app.namespace).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    namespace = %app.namespace,
                    error = %rollback_err,
                    "Failed to roll back app after namespace failure"
                );
            }
            return Err(e.into());
        }

        if let Err(e) = tx.commit().await {
            tracing::error!(
                namespace = %app.namespace,
                account_id = account_id,
                error = %e,
                "App commit failed after namespace creation; namespace is orphaned"
            );
            return Err(e.into());
        }

        tracing::info!(app_id = app.id, namespace = %app.namespace, "App created");
        Ok(app)
    }

    async fn caller_app(&self, caller: &Caller, app_name: &str) -> ApiResult<App> {
        self.metadata
            .find_app_by_name(caller.account.id, app_name)
            .await?
            .ok_or_else(|| ApiError::Rejected(APP_NOT_FOUND_MESSAGE.to_string()))
    }

    /// Store one file in the caller's app.
    pub async fn upload_blob(
        &self,
        caller: &Caller,
        app_name: &str,
        file: FileUpload,
        is_private: bool,
    ) -> ApiResult<Blob> {
        let app = self.caller_app(caller, app_name).await?;
        self.store_blob(&app, file, is_private).await
    }

    /// Store several files in the caller's app.
    ///
    /// Files are stored concurrently and independently; a failed file is
    /// logged and counted without affecting the others.
    pub async fn upload_blobs(
        &self,
        caller: &Caller,
        app_name: &str,
        files: Vec<FileUpload>,
        is_private: bool,
    ) -> ApiResult<BatchUpload> {
        let app = self.caller_app(caller, app_name).await?;
        let total = files.len();

        let results: Vec<_> = futures::stream::iter(files)
            .map(|file| {
                let app = &app;
                async move {
                    let filename = file.filename.clone();
                    (filename, self.store_blob(app, file, is_private).await)
                }
            })
            .buffer_unordered(self.upload_concurrency)
            .collect()
            .await;

        let mut blobs = Vec::with_capacity(total);
        for (filename, result) in results {
            match result {
                Ok(blob) => blobs.push(blob),
                Err(e) => {
                    tracing::warn!(
                        app_id = app.id,
                        filename = %filename,
                        error = %e,
                        "Batch upload item failed"
                    );
                }
            }
        }

        Ok(BatchUpload {
            success_count: blobs.len(),
            failure_count: total - blobs.len(),
            blobs,
        })
    }

    async fn store_blob(&self, app: &App, file: FileUpload, is_private: bool) -> ApiResult<Blob> {
        let content_type = detect_content_type(&file.data);
        let hash = generate_blob_hash();

        let size = self
            .storage
            .put(&app.namespace, &hash, file.data, content_type)
            .await?;

        let new_blob = NewBlob::for_app(
            app,
            hash,
            size,
            content_type.to_string(),
            file.filename,
            is_private,
            &self.public_base_url,
        );

        let blob = match self.metadata.insert_blob(&new_blob).await {
            Ok(blob) => blob,
            Err(e) => {
                if let Err(delete_err) = self.storage.delete(&app.namespace, &new_blob.hash).await {
                    tracing::warn!(
                        namespace = %app.namespace,
                        hash = %new_blob.hash,
                        error = %delete_err,
                        "Failed to remove object after blob insert failure"
                    );
                }
                return Err(e.into());
            }
        };

        // The relational row is authoritative; a cache miss is healed on download.
        if let Err(e) = self.blobs.put(&app.namespace, &blob.hash, &blob).await {
            tracing::warn!(
                namespace = %app.namespace,
                hash = %blob.hash,
                error = %e,
                "Failed to cache blob metadata"
            );
        }

        tracing::debug!(blob_id = blob.id, size = blob.size, "Blob stored");
        Ok(blob)
    }

    /// Open a blob for download.
    ///
    /// Callers without the namespace owner's private key cannot tell a
    /// private blob from a missing one: both are `Unauthorized`.
    pub async fn download_blob(
        &self,
        key: Option<&str>,
        namespace: &str,
        hash: &str,
    ) -> ApiResult<Download> {
        let namespace = namespace.to_lowercase();

        let blob = match self.lookup_blob(&namespace, hash).await? {
            Some(blob) => blob,
            None => {
                return if self.is_namespace_owner(key, &namespace).await? {
                    Err(ApiError::NotFound(BLOB_NOT_FOUND_MESSAGE.to_string()))
                } else {
                    Err(ApiError::Unauthorized)
                };
            }
        };

        if blob.is_private && !self.is_namespace_owner(key, &namespace).await? {
            return Err(ApiError::Unauthorized);
        }

        let stream = self
            .storage
            .get_stream(&namespace, &blob.hash)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ApiError::NotFound(BLOB_NOT_FOUND_MESSAGE.to_string())
                } else {
                    ApiError::Download(format!("{namespace}/{hash}: {e}"))
                }
            })?;

        Ok(Download { blob, stream })
    }

    /// Blob metadata from the cache, falling back to the relational store.
    async fn lookup_blob(&self, namespace: &str, hash: &str) -> ApiResult<Option<Blob>> {
        match self.blobs.get(namespace, hash).await {
            Ok(blob) => return Ok(Some(blob)),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::warn!(namespace, hash, error = %e, "Blob cache read failed");
            }
        }

        let download_err = |e: MetadataError| ApiError::Download(format!("{namespace}/{hash}: {e}"));

        let Some(app) = self
            .metadata
            .find_app_by_namespace(namespace)
            .await
            .map_err(download_err)?
        else {
            return Ok(None);
        };
        let Some(blob) = self
            .metadata
            .find_blob(app.id, hash)
            .await
            .map_err(download_err)?
        else {
            return Ok(None);
        };

        if let Err(e) = self.blobs.put(namespace, hash, &blob).await {
            tracing::warn!(namespace, hash, error = %e, "Failed to repopulate blob cache");
        }
        Ok(Some(blob))
    }

    /// Whether `key` is the private key of the account owning `namespace`.
    async fn is_namespace_owner(&self, key: Option<&str>, namespace: &str) -> ApiResult<bool> {
        let caller = match self.resolve_caller(key, Access::Private).await {
            Ok(caller) => caller,
            Err(ApiError::Unauthorized) => return Ok(false),
            Err(e) => return Err(ApiError::Download(e.to_string())),
        };

        let app = self
            .metadata
            .find_app_by_namespace(namespace)
            .await
            .map_err(|e| ApiError::Download(format!("{namespace}: {e}")))?;

        Ok(app.is_some_and(|app| app.account_id == caller.account.id))
    }

    /// One page of an app's blobs. Only the owner may list them.
    pub async fn list_app_blobs(&self, caller: &Caller, app_id: i64, page: i64) -> ApiResult<Vec<Blob>> {
        let app = self
            .metadata
            .find_app_by_id(app_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(APP_NOT_FOUND_MESSAGE.to_string()))?;

        if app.account_id != caller.account.id {
            return Err(ApiError::Unauthorized);
        }

        Ok(self.metadata.list_blobs(app.id, page).await?)
    }

    /// Every app owned by the caller.
    pub async fn list_account_apps(&self, caller: &Caller) -> ApiResult<Vec<App>> {
        Ok(self.metadata.list_apps(caller.account.id).await?)
    }
}
