use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use shared::llm::{CompletionRequest, HistoryTurn, validate_structured_json};
use shared::models::{
    ChatCompletionRequest, ChatCompletionResponse, ContentKind, ConversationTurnPayload,
};
use tracing::{debug, warn};

use super::super::errors::{bad_request_response, completion_error_response};
use super::super::observability::RequestContext;
use super::super::{AppState, OwnerContext};

pub(crate) async fn medical_chat(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Extension(request_context): Extension<RequestContext>,
    Json(req): Json<ChatCompletionRequest>,
) -> Response {
    let message = req.message.trim();
    if message.is_empty() {
        return bad_request_response("invalid_message", "Message is required");
    }

    let history = req
        .conversation_history
        .into_iter()
        .map(history_turn)
        .collect();
    let request =
        CompletionRequest::new(message, history).with_requester_id(owner.owner.as_str());

    let response = match state.completions.complete(request).await {
        Ok(response) => response,
        Err(err) => {
            warn!(
                request_id = %request_context.request_id,
                error = %err,
                "medical chat completion failed"
            );
            return completion_error_response(&err);
        }
    };

    let (message, kind) = match validate_structured_json(&response.content) {
        Ok(structured) => (structured.to_value(), ContentKind::Json),
        Err(err) => {
            debug!(
                request_id = %request_context.request_id,
                reason = %err,
                "completion is not structured; returning text"
            );
            (Value::String(response.content), ContentKind::Text)
        }
    };

    (
        StatusCode::OK,
        Json(ChatCompletionResponse {
            message,
            kind,
            usage: response.usage,
        }),
    )
        .into_response()
}

/// Prior turns may carry structured payloads; the provider only takes text.
fn history_turn(turn: ConversationTurnPayload) -> HistoryTurn {
    let content = match turn.content {
        Value::String(text) => text,
        other => other.to_string(),
    };
    HistoryTurn {
        role: turn.role,
        content,
    }
}
