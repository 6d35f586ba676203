use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted recording upload
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session records
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/sessions/:session_id",
            get(handlers::get_session).patch(handlers::update_session),
        )
        .route(
            "/api/sessions/:session_id/status",
            patch(handlers::update_session_status),
        )
        // Upload handoff
        .route(
            "/api/recordings/upload",
            post(handlers::upload_recording).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // Server-side recorder control
        .route(
            "/api/sessions/:session_id/record",
            get(handlers::get_recorder),
        )
        .route(
            "/api/sessions/:session_id/record/start",
            post(handlers::start_recorder),
        )
        .route(
            "/api/sessions/:session_id/record/pause",
            post(handlers::pause_recorder),
        )
        .route(
            "/api/sessions/:session_id/record/resume",
            post(handlers::resume_recorder),
        )
        .route(
            "/api/sessions/:session_id/record/stop",
            post(handlers::stop_recorder),
        )
        // Dashboard may be served from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
