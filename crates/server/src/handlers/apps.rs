//! App handlers.

use crate::auth::BloberKey;
use crate::error::ApiResult;
use crate::handlers::common::{reject_malformed, respond};
use crate::service::Access;
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;

/// App creation request body.
#[derive(Debug, Deserialize)]
pub struct CreateAppRequest {
    #[serde(default)]
    pub name: String,
}

/// POST /app/new - Create an app for the caller.
pub async fn create_app(
    State(state): State<AppState>,
    key: BloberKey,
    body: Result<Json<CreateAppRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let caller = state
        .service
        .resolve_caller(key.as_deref(), Access::Private)
        .await?;
    let Json(input) = body.map_err(reject_malformed)?;

    let app = state.service.create_app(&caller, &input.name).await?;
    Ok(respond(StatusCode::CREATED, "app created", app))
}

/// GET /me/apps - List the caller's apps.
pub async fn list_apps(State(state): State<AppState>, key: BloberKey) -> ApiResult<Response> {
    let caller = state
        .service
        .resolve_caller(key.as_deref(), Access::Private)
        .await?;

    let apps = state.service.list_account_apps(&caller).await?;
    Ok(respond(StatusCode::OK, "success", apps))
}

/// GET /apps/{app_id}/blobs/{page} - One page of an app's blobs.
pub async fn list_app_blobs(
    State(state): State<AppState>,
    key: BloberKey,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> ApiResult<Response> {
    let caller = state
        .service
        .resolve_caller(key.as_deref(), Access::Private)
        .await?;
    let Path((app_id, page)) = path.map_err(reject_malformed)?;

    let blobs = state.service.list_app_blobs(&caller, app_id, page).await?;
    Ok(respond(StatusCode::OK, "success", blobs))
}
