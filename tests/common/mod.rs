//! Shared helpers: an in-process mock ComfyUI server and request shortcuts
//! against the relay router.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tokio::sync::watch;
use tower::ServiceExt;

use comfy_relay::api::routes::{router, AppState};

/// How the mock finishes the job it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    /// The job reports an `execution_error` over the socket.
    Fail,
    /// `/prompt` answers 400 with validation `node_errors`.
    RejectPrompt,
    /// The job finishes but `/view` answers 404 for every image.
    MissingImage,
    /// The job finishes but `/history/{id}` has no entry for it.
    EmptyHistory,
}

/// Validation failure text `/prompt` answers with under `Outcome::RejectPrompt`.
pub const PROMPT_REJECTION: &str = "Value not in list: ckpt_name: 'missing.ckpt' not in []";

#[derive(Clone)]
struct MockState {
    job: Arc<watch::Sender<Option<String>>>,
    outcome: Outcome,
    prompts: Arc<AtomicUsize>,
    sockets: Arc<AtomicUsize>,
    submitted: Arc<Mutex<Vec<Value>>>,
}

/// A fake ComfyUI speaking `/prompt`, `/history/{id}`, `/view` and `/ws`.
pub struct MockComfy {
    pub addr: SocketAddr,
    state: MockState,
}

impl MockComfy {
    pub fn start(outcome: Outcome) -> Self {
        let (job, _) = watch::channel(None);
        let state = MockState {
            job: Arc::new(job),
            outcome,
            prompts: Arc::new(AtomicUsize::new(0)),
            sockets: Arc::new(AtomicUsize::new(0)),
            submitted: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/prompt", post(queue_prompt))
            .route("/history/:id", get(history))
            .route("/view", get(view))
            .route("/ws", get(ws_handler))
            .with_state(state.clone());

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind mock ComfyUI");
        listener.set_nonblocking(true).expect("non-blocking listener");
        let addr = listener.local_addr().expect("mock address");
        let server = axum::Server::from_tcp(listener)
            .expect("mock server")
            .serve(app.into_make_service());
        tokio::spawn(async move {
            let _ = server.await;
        });

        MockComfy { addr, state }
    }

    pub fn server(&self) -> String {
        self.addr.to_string()
    }

    pub fn prompts(&self) -> usize {
        self.state.prompts.load(Ordering::SeqCst)
    }

    pub fn sockets(&self) -> usize {
        self.state.sockets.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<Value> {
        self.state.submitted.lock().unwrap().clone()
    }
}

async fn queue_prompt(State(s): State<MockState>, Json(body): Json<Value>) -> Response {
    let n = s.prompts.fetch_add(1, Ordering::SeqCst);
    s.submitted.lock().unwrap().push(body);
    if s.outcome == Outcome::RejectPrompt {
        let rejection = json!({
            "error": {
                "type": "prompt_outputs_failed_validation",
                "message": "Prompt outputs failed validation",
                "details": "",
                "extra_info": {}
            },
            "node_errors": {
                "4": {
                    "errors": [{
                        "type": "value_not_in_list",
                        "message": "Value not in list",
                        "details": PROMPT_REJECTION
                    }],
                    "dependent_outputs": ["9"],
                    "class_type": "CheckpointLoaderSimple"
                }
            }
        });
        return (StatusCode::BAD_REQUEST, Json(rejection)).into_response();
    }
    let id = format!("job-{}", n + 1);
    s.job.send_replace(Some(id.clone()));
    Json(json!({"prompt_id": id, "number": n, "node_errors": {}})).into_response()
}

async fn history(Path(id): Path<String>, State(s): State<MockState>) -> Json<Value> {
    if s.outcome == Outcome::EmptyHistory {
        return Json(json!({}));
    }
    let entry = json!({
        "prompt": [],
        "outputs": {
            "9": {"images": [
                {"filename": "ComfyUI_00001_.png", "subfolder": "", "type": "output"},
                {"filename": "ComfyUI_00002_.png", "subfolder": "batch", "type": "output"}
            ]},
            "10": {"text": ["no images here"]}
        },
        "status": {"status_str": "success", "completed": true}
    });
    let mut body = Map::new();
    body.insert(id, entry);
    Json(Value::Object(body))
}

async fn view(
    Query(q): Query<HashMap<String, String>>,
    State(s): State<MockState>,
) -> Result<Vec<u8>, StatusCode> {
    if s.outcome == Outcome::MissingImage {
        return Err(StatusCode::NOT_FOUND);
    }
    let filename = q.get("filename").ok_or(StatusCode::BAD_REQUEST)?;
    let subfolder = q.get("subfolder").ok_or(StatusCode::BAD_REQUEST)?;
    if q.get("type").map(String::as_str) != Some("output") {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(image_bytes(subfolder, filename))
}

/// Bytes the mock serves for an image reference.
pub fn image_bytes(subfolder: &str, filename: &str) -> Vec<u8> {
    format!("png:{}/{}", subfolder, filename).into_bytes()
}

async fn ws_handler(ws: WebSocketUpgrade, State(s): State<MockState>) -> Response {
    s.sockets.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| drive_socket(socket, s))
}

async fn drive_socket(mut socket: WebSocket, s: MockState) {
    let status = json!({"type": "status", "data": {"status": {"exec_info": {"queue_remaining": 0}}}});
    if socket.send(Message::Text(status.to_string())).await.is_err() {
        return;
    }

    let mut rx = s.job.subscribe();
    if rx.wait_for(Option::is_some).await.is_err() {
        return;
    }
    let id = rx.borrow().clone().unwrap_or_default();

    let terminal = match s.outcome {
        Outcome::Fail => json!({"type": "execution_error", "data": {
            "prompt_id": id, "node_id": "3", "node_type": "KSampler",
            "exception_message": "CUDA out of memory", "exception_type": "RuntimeError",
            "traceback": []
        }}),
        _ => json!({"type": "executing", "data": {"node": null, "prompt_id": id}}),
    };
    let frames = vec![
        Message::Text("not json".to_string()),
        Message::Binary(vec![137, 80, 78, 71]),
        Message::Text(json!({"type": "executing", "data": {"node": null, "prompt_id": "someone-else"}}).to_string()),
        Message::Text(json!({"type": "execution_start", "data": {"prompt_id": id}}).to_string()),
        Message::Text(json!({"type": "executing", "data": {"node": "3", "prompt_id": id}}).to_string()),
        Message::Text(json!({"type": "progress", "data": {"value": 20, "max": 20, "prompt_id": id, "node": "3"}}).to_string()),
        Message::Text(terminal.to_string()),
    ];
    for frame in frames {
        if socket.send(frame).await.is_err() {
            return;
        }
    }
    // Hold the socket open until the relay hangs up.
    while let Some(Ok(_)) = socket.recv().await {}
}

/// The relay router as production builds it, with an empty default server.
pub fn relay_app() -> Router {
    let state = Arc::new(AppState {
        http: reqwest::Client::new(),
        default_server: String::new(),
        required_node: "3".to_string(),
    });
    router(state, "./static")
}

pub async fn post_json(app: Router, uri: &str, body: String) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_uri(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    hyper::body::to_bytes(response.into_body()).await.unwrap().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
