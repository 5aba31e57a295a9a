use std::collections::VecDeque;
use std::sync::Arc;

use api_server::http::{AppState, build_router};
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::{Value, json};
use shared::llm::{
    CompletionError, CompletionFuture, CompletionKind, CompletionRequest, CompletionResponse,
    CompletionService, TokenUsage,
};
use shared::repos::{HistoryStore, MAX_HISTORY_LIMIT, MemoryHistoryStore};
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Completion service that replays queued replies and records requests.
#[derive(Default)]
pub struct ScriptedCompletions {
    replies: Mutex<VecDeque<Result<CompletionResponse, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletions {
    pub fn with_replies(replies: Vec<Result<CompletionResponse, CompletionError>>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

impl CompletionService for ScriptedCompletions {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            self.requests.lock().await.push(request);
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(text_reply("No scripted reply left.")))
        })
    }
}

pub fn text_reply(text: &str) -> CompletionResponse {
    CompletionResponse {
        content: text.to_string(),
        kind: CompletionKind::Plain,
        model: Some("test-model".to_string()),
        usage: Some(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

pub fn structured_reply() -> CompletionResponse {
    CompletionResponse {
        content: json!({
            "greeting": "I'm sorry to hear that.",
            "mainContent": {
                "summary": "Most headaches are harmless.",
                "keyPoints": ["Track triggers"],
                "recommendations": []
            },
            "disclaimer": "General information only."
        })
        .to_string(),
        kind: CompletionKind::Structured,
        model: Some("test-model".to_string()),
        usage: None,
    }
}

pub fn build_test_router(
    history: Arc<dyn HistoryStore>,
    completions: Arc<dyn CompletionService>,
) -> axum::Router {
    build_router(AppState {
        history,
        completions,
        history_limit: MAX_HISTORY_LIMIT,
    })
}

pub fn memory_router(completions: Arc<ScriptedCompletions>) -> axum::Router {
    build_test_router(Arc::new(MemoryHistoryStore::new()), completions)
}

pub struct JsonResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send_json(app: &axum::Router, request: Request<Body>) -> JsonResponse {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should succeed");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should read");
    let body = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({}));

    JsonResponse {
        status,
        headers,
        body,
    }
}

pub fn request(
    method: Method,
    uri: &str,
    owner_id: Option<&str>,
    json_body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(owner_id) = owner_id {
        builder = builder.header(OWNER_HEADER, owner_id);
    }

    match json_body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build"),
        None => builder.body(Body::empty()).expect("request should build"),
    }
}

pub fn request_id(response: &JsonResponse) -> Option<&str> {
    response
        .headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
}

pub fn error_code(body: &Value) -> Option<&str> {
    body.get("error")
        .and_then(|error| error.get("code"))
        .and_then(Value::as_str)
}
