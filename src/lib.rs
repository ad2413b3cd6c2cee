//! ComfyUI workflow relay library
//!
//! Modules:
//! - `api`: Axum HTTP handlers and router setup used by the binary.
//! - `comfyui`: HTTP client, endpoint resolution and WebSocket message types.
//! - `relay`: Submit a workflow, wait for the job, collect its images.
//! - `workflow`: Typed workflow graph, built-in template and overrides.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `ComfyUIClient`,
//! `Endpoint` and `Workflow`.
pub mod api;
pub mod comfyui;
pub mod config;
pub mod error;
pub mod relay;
pub mod workflow;

pub use comfyui::client::ComfyUIClient;
pub use comfyui::endpoint::Endpoint;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use workflow::Workflow;

/// Install the `tracing` subscriber, honouring `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
