mod handlers;
mod openapi;
mod state;

pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Multipart framing overhead allowed on top of the upload ceiling, so the
/// validator (not the transport) produces the FileTooLarge error.
const BODY_LIMIT_MARGIN: usize = 16 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.limits.max_upload_bytes() as usize + BODY_LIMIT_MARGIN;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/supported-languages/", get(handlers::supported_languages))
        .route("/ocr/", post(handlers::run_ocr))
        .route("/openapi.json", get(openapi::openapi_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
