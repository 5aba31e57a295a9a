use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, field, info, info_span, warn};
use uuid::Uuid;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone, Debug)]
pub(super) struct RequestContext {
    pub(super) request_id: String,
}

/// Which part of the chat API a request targets, for log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatSurface {
    Health,
    MedicalChat,
    EncounterSave,
    HistoryList,
    Unrouted,
}

impl ChatSurface {
    fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/healthz" | "/readyz" => Self::Health,
            "/v1/chat/medical" => Self::MedicalChat,
            "/v1/chat/encounter" => Self::EncounterSave,
            "/v1/chat/history" => Self::HistoryList,
            _ => Self::Unrouted,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::MedicalChat => "medical_chat",
            Self::EncounterSave => "encounter_save",
            Self::HistoryList => "history_list",
            Self::Unrouted => "unrouted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestOutcome {
    Completed,
    Rejected,
    Failed,
}

impl RequestOutcome {
    fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            Self::Failed
        } else if status.is_client_error() {
            Self::Rejected
        } else {
            Self::Completed
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// Opens a `chat_request` span for the whole request. The owner field is
/// filled in by the identity middleware once the caller is known.
pub(super) async fn request_observability_middleware(mut req: Request, next: Next) -> Response {
    let request_id =
        incoming_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    let surface = ChatSurface::from_path(req.uri().path());
    let span = info_span!(
        "chat_request",
        request_id = %request_id,
        surface = surface.as_str(),
        method = %req.method(),
        owner = field::Empty,
    );
    req.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let started_at = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status();
    let outcome = RequestOutcome::from_status(status);
    let latency_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    span.in_scope(|| match outcome {
        RequestOutcome::Failed => warn!(
            status = status.as_u16(),
            outcome = outcome.as_str(),
            latency_ms,
            "chat request failed"
        ),
        _ => info!(
            status = status.as_u16(),
            outcome = outcome.as_str(),
            latency_ms,
            "chat request finished"
        ),
    });

    response
}

/// A caller-supplied id is kept when it is a short printable ASCII token.
fn incoming_request_id(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(&REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let acceptable = !raw.is_empty()
        && raw.len() <= MAX_REQUEST_ID_LEN
        && raw.bytes().all(|byte| byte.is_ascii_graphic());
    acceptable.then(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, StatusCode};

    use super::{ChatSurface, REQUEST_ID_HEADER, RequestOutcome, incoming_request_id};

    #[test]
    fn chat_routes_map_to_their_surface() {
        assert_eq!(
            ChatSurface::from_path("/v1/chat/medical"),
            ChatSurface::MedicalChat
        );
        assert_eq!(
            ChatSurface::from_path("/v1/chat/encounter/"),
            ChatSurface::EncounterSave
        );
        assert_eq!(
            ChatSurface::from_path("/v1/chat/history"),
            ChatSurface::HistoryList
        );
        assert_eq!(ChatSurface::from_path("/readyz"), ChatSurface::Health);
        assert_eq!(ChatSurface::from_path("/v1/chat"), ChatSurface::Unrouted);
    }

    #[test]
    fn provider_and_store_failures_are_the_only_failed_outcomes() {
        assert_eq!(
            RequestOutcome::from_status(StatusCode::BAD_GATEWAY),
            RequestOutcome::Failed
        );
        assert_eq!(
            RequestOutcome::from_status(StatusCode::TOO_MANY_REQUESTS),
            RequestOutcome::Rejected
        );
        assert_eq!(
            RequestOutcome::from_status(StatusCode::CREATED),
            RequestOutcome::Completed
        );
    }

    #[test]
    fn caller_request_id_is_kept_only_when_printable_and_short() {
        let with_id = |raw: &str| {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(raw) {
                headers.insert(REQUEST_ID_HEADER, value);
            }
            incoming_request_id(&headers)
        };

        assert_eq!(with_id(" enc-7:turn-3 "), Some("enc-7:turn-3".to_string()));
        assert_eq!(with_id("two words"), None);
        assert_eq!(with_id(&"r".repeat(129)), None);
        assert_eq!(incoming_request_id(&HeaderMap::new()), None);
    }
}
