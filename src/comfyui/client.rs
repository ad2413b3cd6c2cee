//! Thin HTTP client for ComfyUI endpoints.
//!
//! - `queue_prompt` posts a workflow to `/prompt` and returns the job id.
//! - `get_history` fetches `/history/<id>` and extracts that job's entry.
//! - `get_image` dereferences an image reference through `/view`.
use std::collections::{BTreeMap, HashMap};

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::comfyui::endpoint::Endpoint;
use crate::error::{AppError, AppResult};
use crate::workflow::Workflow;

#[derive(Clone)]
pub struct ComfyUIClient {
    client: Client,
    base_url: String,
}

/// Response of `POST /prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResponse {
    pub prompt_id: String,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_errors: Option<Value>,
}

/// One job's entry in `/history/<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub outputs: BTreeMap<String, NodeOutput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Option<Vec<ImageRef>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type")]
    pub folder_type: String,
}

impl HistoryEntry {
    /// Image references per output node, skipping nodes that produced none.
    pub fn images(&self) -> impl Iterator<Item = (&String, &[ImageRef])> {
        self.outputs
            .iter()
            .filter_map(|(node, out)| out.images.as_deref().map(|imgs| (node, imgs)))
    }
}

impl ComfyUIClient {
    pub fn new(base_url: String) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] so connections are pooled.
    pub fn with_client(client: Client, base_url: String) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        ComfyUIClient { client, base_url: base }
    }

    pub fn for_endpoint(client: Client, endpoint: &Endpoint) -> Self {
        Self::with_client(client, endpoint.http_base().to_string())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Queue a workflow with ComfyUI under `client_id`.
    pub async fn queue_prompt(&self, workflow: &Workflow, client_id: &str) -> AppResult<QueueResponse> {
        let url = format!("{}/prompt", self.base_url);
        tracing::info!(client_id, nodes = workflow.len(), "Sending prompt to ComfyUI at URL: {}", url);

        let body = json!({
            "prompt": workflow,
            "client_id": client_id,
        });
        let response = self.client.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(AppError::HttpClient)?;

        let response = ensure_success(response, "queue prompt").await?;
        let queued: QueueResponse = response.json().await.map_err(AppError::HttpClient)?;
        tracing::info!(prompt_id = %queued.prompt_id, number = ?queued.number, "Successfully queued prompt");
        Ok(queued)
    }

    /// Retrieve the execution history entry of one job.
    pub async fn get_history(&self, prompt_id: &str) -> AppResult<HistoryEntry> {
        let url = format!("{}/history/{}", self.base_url, prompt_id);
        let response = self.client.get(&url)
            .send()
            .await
            .map_err(AppError::HttpClient)?;

        let response = ensure_success(response, "get history").await?;
        let mut history: HashMap<String, Value> = response.json().await.map_err(AppError::HttpClient)?;
        let entry = history.remove(prompt_id).ok_or_else(|| {
            AppError::Protocol(format!("History has no entry for job {}", prompt_id))
        })?;
        serde_json::from_value(entry).map_err(|e| {
            AppError::Protocol(format!("Malformed history entry for job {}: {}", prompt_id, e))
        })
    }

    /// Fetch image bytes via ComfyUI's `/view` endpoint.
    pub async fn get_image(&self, image: &ImageRef) -> AppResult<Vec<u8>> {
        let url = format!("{}/view", self.base_url);
        tracing::debug!(filename = %image.filename, subfolder = %image.subfolder, "Fetching image");
        let response = self.client.get(&url)
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.folder_type.as_str()),
            ])
            .send()
            .await
            .map_err(AppError::HttpClient)?;

        let response = ensure_success(response, "get image").await?;
        response.bytes().await.map(|b| b.to_vec()).map_err(AppError::HttpClient)
    }
}

async fn ensure_success(response: Response, action: &str) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_body = response.text().await.unwrap_or_else(|_| "Unable to read error body".to_string());
    let error_message = format!("Failed to {}. Status: {}, Body: {}", action, status, error_body);
    tracing::error!("{}", error_message);
    Err(AppError::ComfyUI(error_message))
}
