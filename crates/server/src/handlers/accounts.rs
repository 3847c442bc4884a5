//! Signup and login handlers.

use crate::error::ApiResult;
use crate::handlers::common::{reject_malformed, respond};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Response;
use blober_core::NewAccount;
use serde::Deserialize;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /account/new - Create an account and return its first credential.
pub async fn create_account(
    State(state): State<AppState>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(input) = body.map_err(reject_malformed)?;
    let account = state.service.create_account(input).await?;
    Ok(respond(StatusCode::CREATED, "account created", account))
}

/// POST /account/authenticate - Exchange email and password for a new credential.
pub async fn authenticate(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(input) = body.map_err(reject_malformed)?;
    let account = state
        .service
        .authenticate(&input.email, &input.password)
        .await?;
    Ok(respond(StatusCode::OK, "account authenticated", account))
}
