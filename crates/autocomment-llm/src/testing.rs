//! In-process stand-in for an Ollama endpoint and an OpenAI-compatible gateway.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct MockEndpoint {
    /// `None` makes the listing answer 503.
    models: Option<Vec<String>>,
    generate_status: StatusCode,
    generate_text: String,
    generate_calls: Arc<AtomicUsize>,
    last_generate: Arc<Mutex<Option<Value>>>,
    chat_calls: Arc<AtomicUsize>,
    last_chat: Arc<Mutex<Option<(Option<String>, Value)>>>,
}

impl MockEndpoint {
    pub fn with_models(models: &[&str]) -> Self {
        Self {
            models: Some(models.iter().map(|m| m.to_string()).collect()),
            generate_status: StatusCode::OK,
            generate_text: String::new(),
            generate_calls: Arc::default(),
            last_generate: Arc::default(),
            chat_calls: Arc::default(),
            last_chat: Arc::default(),
        }
    }

    pub fn down() -> Self {
        Self {
            models: None,
            ..Self::with_models(&[])
        }
    }

    pub fn generating(mut self, text: &str) -> Self {
        self.generate_text = text.to_string();
        self
    }

    pub fn failing_with(mut self, status: StatusCode) -> Self {
        self.generate_status = status;
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn last_generate(&self) -> Option<Value> {
        self.last_generate.lock().unwrap().clone()
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    /// Authorization header and body of the last chat completion request.
    pub fn last_chat(&self) -> Option<(Option<String>, Value)> {
        self.last_chat.lock().unwrap().clone()
    }
}

pub struct MockServer {
    pub url: String,
    pub endpoint: MockEndpoint,
}

pub async fn spawn(endpoint: MockEndpoint) -> MockServer {
    let app = Router::new()
        .route("/api/tags", get(tags))
        .route("/api/generate", post(generate))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(endpoint.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    MockServer {
        url: format!("http://{addr}"),
        endpoint,
    }
}

async fn tags(State(mock): State<MockEndpoint>) -> Response {
    match &mock.models {
        Some(models) => {
            let entries: Vec<Value> = models.iter().map(|m| json!({ "name": m })).collect();
            Json(json!({ "models": entries })).into_response()
        }
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn generate(State(mock): State<MockEndpoint>, Json(body): Json<Value>) -> Response {
    mock.generate_calls.fetch_add(1, Ordering::SeqCst);
    *mock.last_generate.lock().unwrap() = Some(body.clone());
    if !mock.generate_status.is_success() {
        return (mock.generate_status, "model exploded").into_response();
    }
    Json(json!({
        "model": body.get("model").cloned().unwrap_or(Value::Null),
        "response": mock.generate_text,
        "done": true,
    }))
    .into_response()
}

async fn chat_completions(
    State(mock): State<MockEndpoint>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.chat_calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *mock.last_chat.lock().unwrap() = Some((auth, body.clone()));
    if !mock.generate_status.is_success() {
        return (mock.generate_status, "gateway exploded").into_response();
    }
    Json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": body.get("model").cloned().unwrap_or(Value::Null),
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": mock.generate_text },
            "finish_reason": "stop",
        }],
    }))
    .into_response()
}
