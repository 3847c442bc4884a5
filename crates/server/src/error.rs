//! API error types.

use crate::handlers::common::Envelope;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Client-facing text for every internal fault.
pub const INTERNAL_MESSAGE: &str = "something went wrong";
/// Client-facing text for faults on the download path.
pub const DOWNLOAD_FAILED_MESSAGE: &str = "failed to download blob";
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized request";
pub const BAD_REQUEST_MESSAGE: &str = "bad request";

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A request the service declined for a business reason (validation,
    /// duplicates, unknown app). Reported with HTTP 200 and `error: true`.
    #[error("{0}")]
    Rejected(String),

    #[error("unauthorized request")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("storage error: {0}")]
    Storage(#[from] blober_storage::StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] blober_metadata::MetadataError),

    #[error("cache error: {0}")]
    Cache(#[from] blober_cache::CacheError),

    #[error("core error: {0}")]
    Core(#[from] blober_core::Error),
}

impl ApiError {
    pub fn bad_request() -> Self {
        Self::BadRequest(BAD_REQUEST_MESSAGE.to_string())
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected(_) => StatusCode::OK,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Core(e) if e.is_validation() => StatusCode::OK,
            Self::Internal(_)
            | Self::Download(_)
            | Self::Storage(_)
            | Self::Metadata(_)
            | Self::Cache(_)
            | Self::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Store error text never leaves the server.
    pub fn client_message(&self) -> String {
        match self {
            Self::Rejected(msg) | Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::Unauthorized => UNAUTHORIZED_MESSAGE.to_string(),
            Self::Core(e) if e.is_validation() => e.to_string(),
            Self::Download(_) => DOWNLOAD_FAILED_MESSAGE.to_string(),
            Self::Internal(_)
            | Self::Storage(_)
            | Self::Metadata(_)
            | Self::Cache(_)
            | Self::Core(_) => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Envelope::<serde_json::Value>::error(self.client_message());
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
