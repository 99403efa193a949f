//! Editing server for recorded agent trajectory documents.
//!
//! This crate exposes the consistency engine from `trajedit_core` over a
//! small stateless HTTP API, and stores edited documents in a data directory.
//! It can be used as a standalone binary or embedded in another application.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
pub use error::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Directory saved trajectories live in
    pub data_dir: PathBuf,
    /// Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create a new AppState with the given data directory and default config.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            config: Arc::new(AppConfig::default()),
        }
    }

    /// Create a new AppState with the given data directory and config.
    pub fn with_config(data_dir: PathBuf, config: AppConfig) -> Self {
        Self {
            data_dir,
            config: Arc::new(config),
        }
    }
}

/// Build the full router with CORS, tracing and the body size limit.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::trajectory_routes())
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
