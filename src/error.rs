//! Common error type and alias.
//!
//! Every failure in the relay aborts the request. [`AppError`] implements
//! [`IntoResponse`] so handlers can return it directly: caller mistakes map to
//! `400`, everything that went wrong talking to ComfyUI maps to `500`.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tokio_tungstenite::tungstenite;

use crate::workflow::WorkflowError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The incoming request was unusable.
    #[error("{0}")]
    BadRequest(String),

    /// The submitted workflow could not be parsed or failed validation.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Outbound HTTP request to ComfyUI failed (network, DNS, body decode).
    #[error("HTTP request failed: {0}")]
    HttpClient(reqwest::Error),

    /// WebSocket connect or receive failure.
    #[error("WebSocket error: {0}")]
    WebSocket(tungstenite::Error),

    /// ComfyUI answered with a non-2xx status.
    #[error("{0}")]
    ComfyUI(String),

    /// ComfyUI reported that the job failed while executing.
    #[error("execution failed at node {node_id}: {message}")]
    Execution { node_id: String, message: String },

    /// ComfyUI sent something the relay could not make sense of.
    #[error("{0}")]
    Protocol(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Workflow(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Workflow(_) => "INVALID_WORKFLOW",
            AppError::HttpClient(_) | AppError::WebSocket(_) => "UPSTREAM_UNREACHABLE",
            AppError::ComfyUI(_) => "UPSTREAM_ERROR",
            AppError::Execution { .. } => "EXECUTION_ERROR",
            AppError::Protocol(_) => "PROTOCOL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Relay request failed");
        }
        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (status, axum::Json(body)).into_response()
    }
}
