use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::llm::CompletionError;
use shared::models::{ErrorBody, ErrorResponse};
use shared::repos::HistoryStoreError;
use tracing::error;

pub(super) fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(super) fn unauthorized_response() -> Response {
    error_response(StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized")
}

pub(super) fn completion_error_response(err: &CompletionError) -> Response {
    match err.provider_code() {
        Some("invalid_api_key") => error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_api_key",
            "Invalid completions API key. Please check your configuration.",
        ),
        Some("insufficient_quota") => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "insufficient_quota",
            "Completions quota exceeded. Please check your usage limits.",
        ),
        Some("model_not_found") => bad_request_response(
            "model_not_found",
            "Model not available. Please try again later.",
        ),
        _ => error_response(
            StatusCode::BAD_GATEWAY,
            "completion_failed",
            "Failed to get AI response. Please try again later.",
        ),
    }
}

pub(super) fn store_error_response(err: HistoryStoreError) -> Response {
    match err {
        HistoryStoreError::EmptyEncounter => {
            bad_request_response("no_messages", "No messages to save")
        }
        other => {
            error!("history store operation failed: {other}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Unexpected server error",
            )
        }
    }
}
