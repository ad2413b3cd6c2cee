//! The workflow relay: submit, wait for completion, collect images.
//!
//! One WebSocket per run, registered under a fresh client id. The wait loop
//! has no timeout; a silent server stalls the caller until the socket drops.
use std::collections::BTreeMap;

use futures::{Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::comfyui::client::{ComfyUIClient, HistoryEntry};
use crate::comfyui::endpoint::Endpoint;
use crate::comfyui::messages::{parse_message, ComfyUIMessage, JobSignal};
use crate::error::{AppError, AppResult};
use crate::workflow::Workflow;

/// Image bytes per output node id, in the order ComfyUI reported them.
pub type NodeImages = BTreeMap<String, Vec<Vec<u8>>>;

/// Run `workflow` on the ComfyUI server at `endpoint` and return its images.
pub async fn run_workflow(
    http: reqwest::Client,
    endpoint: &Endpoint,
    workflow: &Workflow,
) -> AppResult<NodeImages> {
    let client_id = uuid::Uuid::new_v4().to_string();
    let url = endpoint.ws_url(&client_id);

    let (mut ws_stream, _response) = connect_async(url.as_str())
        .await
        .map_err(AppError::WebSocket)?;
    tracing::info!(client_id = %client_id, server = %endpoint.http_base(), "Connected to ComfyUI");

    let comfy = ComfyUIClient::for_endpoint(http, endpoint);
    let outcome = submit_and_collect(&comfy, &mut ws_stream, workflow, &client_id).await;

    if let Err(e) = ws_stream.close(None).await {
        tracing::debug!(client_id = %client_id, error = %e, "WebSocket close failed");
    }
    outcome
}

async fn submit_and_collect<S>(
    comfy: &ComfyUIClient,
    ws_stream: &mut S,
    workflow: &Workflow,
    client_id: &str,
) -> AppResult<NodeImages>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let queued = comfy.queue_prompt(workflow, client_id).await?;
    wait_for_completion(ws_stream, &queued.prompt_id).await?;
    let history = comfy.get_history(&queued.prompt_id).await?;
    fetch_images(comfy, &history).await
}

/// Read frames until ComfyUI reports `prompt_id` finished or failed.
///
/// Frames for other jobs, unknown message kinds and binary previews are
/// skipped. A closed or broken socket ends the wait with an error.
pub async fn wait_for_completion<S>(stream: &mut S, prompt_id: &str) -> AppResult<()>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame.map_err(AppError::WebSocket)? {
            Message::Text(text) => {
                let msg = match parse_message(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::trace!(error = %e, raw_message = %text, "Skipping unrecognised message");
                        continue;
                    }
                };
                match msg.signal_for(prompt_id) {
                    Some(JobSignal::Finished) => {
                        tracing::info!(prompt_id, "Execution finished");
                        return Ok(());
                    }
                    Some(JobSignal::Failed { node_id, message }) => {
                        tracing::warn!(prompt_id, node = %node_id, "Execution failed: {}", message);
                        return Err(AppError::Execution { node_id, message });
                    }
                    None => log_progress(prompt_id, &msg),
                }
            }
            Message::Binary(_) => {
                tracing::trace!(prompt_id, "Ignoring binary message (preview image)");
            }
            Message::Close(frame) => {
                return Err(AppError::Protocol(format!(
                    "WebSocket closed before job {} finished: {:?}",
                    prompt_id, frame
                )));
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    Err(AppError::Protocol(format!(
        "WebSocket stream ended before job {} finished",
        prompt_id
    )))
}

fn log_progress(prompt_id: &str, msg: &ComfyUIMessage) {
    match msg {
        ComfyUIMessage::Executing(data) if data.prompt_id.as_deref() == Some(prompt_id) => {
            tracing::debug!(prompt_id, node = ?data.node, "Executing node");
        }
        ComfyUIMessage::Progress(data) => {
            tracing::debug!(prompt_id, value = data.value, max = data.max, "Generation progress");
        }
        ComfyUIMessage::ExecutionCached(data) if data.prompt_id == prompt_id => {
            tracing::debug!(prompt_id, cached = data.nodes.len(), "Execution used cache");
        }
        ComfyUIMessage::Status(data) => {
            tracing::debug!(queue_remaining = data.status.exec_info.queue_remaining, "ComfyUI queue status");
        }
        _ => {}
    }
}

/// Download every image the history entry references.
pub async fn fetch_images(comfy: &ComfyUIClient, history: &HistoryEntry) -> AppResult<NodeImages> {
    let mut output = NodeImages::new();
    for (node_id, refs) in history.images() {
        let mut images = Vec::with_capacity(refs.len());
        for image in refs {
            images.push(comfy.get_image(image).await?);
        }
        tracing::debug!(node = %node_id, count = images.len(), "Fetched node images");
        output.insert(node_id.clone(), images);
    }
    Ok(output)
}
