//! Route configuration.

use crate::auth::trace_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.server.max_upload_bytes).unwrap_or(usize::MAX);

    let mut router = Router::new()
        // Health check (unauthenticated for load balancers)
        .route("/health", get(handlers::health_check))
        // Accounts
        .route("/account/new", post(handlers::create_account))
        .route("/account/authenticate", post(handlers::authenticate))
        // Apps
        .route("/app/new", post(handlers::create_app))
        .route("/me/apps", get(handlers::list_apps))
        .route(
            "/apps/{app_id}/blobs/{page}",
            get(handlers::list_app_blobs),
        )
        // Blobs. The first segment is an app name for uploads and a
        // namespace for downloads.
        .route("/{name}/upload", post(handlers::upload_blob))
        .route("/{name}/uploads", post(handlers::upload_blobs))
        .route("/{name}/{hash}", get(handlers::download_blob))
        .route("/{name}/{hash}/download", get(handlers::download_blob))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed);

    if state.config.server.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    // Layers run outermost first: TraceLayer -> trace id span -> body limit -> handler
    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
