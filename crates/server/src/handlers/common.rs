//! Response envelope and router-level handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Body of every JSON response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub error: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data,
        }
    }
}

impl Envelope<serde_json::Value> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }
}

/// Successful envelope response with the given status.
pub fn respond<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    (status, Json(Envelope::ok(message, data))).into_response()
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health - Check relational store and object store connectivity.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.metadata.health_check().await?;
    state.storage.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// Fallback for unknown paths.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(Envelope::error("That address is not found on this server")),
    )
        .into_response()
}

/// Fallback for known paths hit with the wrong method.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(Envelope::error("Method not allowed")),
    )
        .into_response()
}

/// Map any extractor rejection to the plain 400 envelope.
pub fn reject_malformed<E: std::fmt::Display>(err: E) -> ApiError {
    tracing::debug!(error = %err, "Malformed request");
    ApiError::bad_request()
}
