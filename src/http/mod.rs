//! HTTP surface: route table, shared state, and the error/response shapes
//! every handler returns through.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the full route table over `state`. Split out from `main` so
/// integration tests can exercise it in-process via `tower::ServiceExt::oneshot`.
///
/// Axum's default body-size limit (2 MiB) is disabled: C6 already enforces
/// `maxFileSizeMb` itself, streaming-aware, so a second blanket limit here
/// would just reject legitimate uploads under a different error shape.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/config", get(handlers::config::get_config))
        .route("/v1/config", get(handlers::config::get_config))
        .route("/v1/models", get(handlers::models::list_models))
        .route("/v1/models/:id", get(handlers::models::get_model))
        .route("/v1/audio/transcriptions", post(handlers::transcribe::transcribe_multipart))
        .route("/v1/audio/transcriptions/base64", post(handlers::transcribe::transcribe_base64))
        .route("/v1/audio/transcriptions/url", post(handlers::transcribe::transcribe_url))
        .layer(DefaultBodyLimit::disable())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
