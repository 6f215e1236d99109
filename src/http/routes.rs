use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Device enumeration
        .route("/devices", get(handlers::list_devices))
        .route("/capabilities", get(handlers::capabilities))
        // Capture control
        .route("/capture/start", post(handlers::capture_start))
        .route("/capture/stop/:session_id", post(handlers::capture_stop))
        .route(
            "/capture/status/:session_id",
            get(handlers::capture_status),
        )
        // Network send control
        .route("/send/start", post(handlers::send_start))
        .route("/send/stop/:session_id", post(handlers::send_stop))
        // Processing pipeline
        .route("/process", post(handlers::process_start))
        .route("/process/:task_id", get(handlers::process_status))
        // Local UI clients poll from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
