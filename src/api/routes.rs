//! Router construction and shared state.
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::config::Config;

/// Per-process defaults; nothing here changes while serving.
pub struct AppState {
    pub http: reqwest::Client,
    pub default_server: String,
    pub required_node: String,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        AppState {
            http: reqwest::Client::new(),
            default_server: config.comfyui_server.clone(),
            required_node: config.required_node.clone(),
        }
    }
}

pub fn router(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/process", post(handlers::process_workflow))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
