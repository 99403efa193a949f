use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;
use crate::handlers;

/// Create trajectory editing routes
pub fn trajectory_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Document edits
        .route("/replace_thought", post(handlers::replace_thought))
        .route("/remove_step", post(handlers::remove_step))
        .route("/replace", post(handlers::replace))
        .route("/steps", post(handlers::steps))
        // Storage
        .route("/save", post(handlers::save))
        .route("/files", get(handlers::list_files))
}
