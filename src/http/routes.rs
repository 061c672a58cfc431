use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the HTTP router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Status and recording control
        .route("/api/status", get(handlers::get_status))
        .route("/api/record/start", post(handlers::start_record))
        .route("/api/record/stop", post(handlers::stop_record))
        // Context buffers
        .route("/api/context/:modality", get(handlers::get_context))
        // Stream search and index prompts
        .route("/api/rtstream/search", post(handlers::rtstream_search))
        .route(
            "/api/rtstream/update-prompt",
            post(handlers::update_prompt),
        )
        // Overlay passthrough
        .route("/api/overlay/show", post(handlers::overlay_show))
        .route("/api/overlay/hide", post(handlers::overlay_hide))
        .route(
            "/api/permission-prompt",
            post(handlers::permission_prompt),
        )
        // Assistant session
        .route(
            "/api/assistant-session",
            get(handlers::assistant_session),
        )
        // Lifecycle
        .route("/api/shutdown", post(handlers::shutdown))
        .route("/webhook", post(handlers::webhook))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
