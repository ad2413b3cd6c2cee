//! Axum request handlers for the HTTP API.
use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Html;
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::api::routes::AppState;
use crate::comfyui::endpoint::Endpoint;
use crate::error::{AppError, AppResult};
use crate::relay;
use crate::workflow::Workflow;

const INDEX_HTML: &str = include_str!("../../templates/index.html");

pub const SUCCESS_MESSAGE: &str = "Workflow processed successfully!";

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    /// Workflow JSON, as a string.
    pub workflow: String,
    #[serde(default)]
    pub server: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub message: &'static str,
    /// Base64-encoded image bytes per output node.
    pub output: BTreeMap<String, Vec<String>>,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn process_workflow(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> AppResult<Json<ProcessResponse>> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    // Everything that can be rejected locally is checked before any
    // connection to ComfyUI is opened.
    let workflow = Workflow::parse(&request.workflow)?;
    workflow.require_node(&state.required_node)?;
    let server = if request.server.trim().is_empty() {
        state.default_server.as_str()
    } else {
        request.server.as_str()
    };
    let endpoint = Endpoint::parse(server)?;

    tracing::info!(server = %endpoint.http_base(), nodes = workflow.len(), "Processing workflow");
    let images = relay::run_workflow(state.http.clone(), &endpoint, &workflow).await?;

    let output: BTreeMap<String, Vec<String>> = images
        .into_iter()
        .map(|(node, list)| (node, list.iter().map(|bytes| STANDARD.encode(bytes)).collect()))
        .collect();
    Ok(Json(ProcessResponse {
        message: SUCCESS_MESSAGE,
        output,
    }))
}
