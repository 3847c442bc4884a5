//! HTTP API server for blober.
//!
//! This crate provides the HTTP surface:
//! - Account signup and login
//! - App creation and listing
//! - Single and batch blob uploads
//! - Public and private blob downloads
//! - Paged blob listing per app

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod service;
pub mod state;

pub use auth::{BloberKey, TraceId};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use service::BloberService;
pub use state::AppState;
