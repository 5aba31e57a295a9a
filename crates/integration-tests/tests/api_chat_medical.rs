mod support;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;
use shared::llm::CompletionError;
use shared::models::Role;
use support::api_app::{
    ScriptedCompletions, error_code, memory_router, request, send_json, structured_reply,
    text_reply,
};

#[tokio::test]
async fn chat_routes_require_owner_identity() {
    let app = memory_router(Arc::new(ScriptedCompletions::default()));

    for (method, uri) in [
        (Method::POST, "/v1/chat/medical"),
        (Method::POST, "/v1/chat/encounter"),
        (Method::GET, "/v1/chat/history"),
    ] {
        let body = (method == Method::POST).then(|| json!({}));
        let response = send_json(&app, request(method, uri, None, body)).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(error_code(&response.body), Some("unauthorized"));
    }

    let health = send_json(&app, request(Method::GET, "/healthz", None, None)).await;
    assert_eq!(health.status, StatusCode::OK);
}

#[tokio::test]
async fn structured_completion_is_returned_as_json_type() {
    let completions = Arc::new(ScriptedCompletions::with_replies(vec![Ok(
        structured_reply(),
    )]));
    let app = memory_router(Arc::clone(&completions));

    let response = send_json(
        &app,
        request(
            Method::POST,
            "/v1/chat/medical",
            Some("owner-1"),
            Some(json!({
                "message": "  I have a headache  ",
                "conversationHistory": [
                    { "role": "assistant", "content": { "greeting": "Welcome" } },
                    { "role": "user", "content": "hello" }
                ]
            })),
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["type"], "json");
    assert_eq!(response.body["message"]["greeting"], "I'm sorry to hear that.");
    assert_eq!(
        response.body["message"]["mainContent"]["keyPoints"][0],
        "Track triggers"
    );

    let requests = completions.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].user_message, "I have a headache");
    assert_eq!(requests[0].requester_id.as_deref(), Some("owner-1"));
    assert_eq!(requests[0].history.len(), 2);
    assert_eq!(requests[0].history[0].role, Role::Assistant);
    assert_eq!(requests[0].history[0].content, r#"{"greeting":"Welcome"}"#);
}

#[tokio::test]
async fn unstructured_completion_falls_back_to_text_type() {
    let incomplete = shared::llm::CompletionResponse {
        content: r#"{"mainContent":{},"disclaimer":"x"}"#.to_string(),
        ..structured_reply()
    };
    let completions = Arc::new(ScriptedCompletions::with_replies(vec![
        Ok(text_reply("Drink water and rest.")),
        Ok(incomplete),
    ]));
    let app = memory_router(completions);

    let plain = send_json(
        &app,
        request(
            Method::POST,
            "/v1/chat/medical",
            Some("owner-1"),
            Some(json!({ "message": "tips?" })),
        ),
    )
    .await;
    assert_eq!(plain.status, StatusCode::OK);
    assert_eq!(plain.body["type"], "text");
    assert_eq!(plain.body["message"], "Drink water and rest.");
    assert_eq!(plain.body["usage"]["total_tokens"], 15);

    let downgraded = send_json(
        &app,
        request(
            Method::POST,
            "/v1/chat/medical",
            Some("owner-1"),
            Some(json!({ "message": "again?" })),
        ),
    )
    .await;
    assert_eq!(downgraded.body["type"], "text");
    assert_eq!(
        downgraded.body["message"],
        r#"{"mainContent":{},"disclaimer":"x"}"#
    );
}

#[tokio::test]
async fn blank_message_is_rejected_without_calling_the_provider() {
    let completions = Arc::new(ScriptedCompletions::default());
    let app = memory_router(Arc::clone(&completions));

    let response = send_json(
        &app,
        request(
            Method::POST,
            "/v1/chat/medical",
            Some("owner-1"),
            Some(json!({ "message": "   " })),
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.body), Some("invalid_message"));
    assert!(completions.requests().await.is_empty());
}

#[tokio::test]
async fn provider_errors_map_to_distinct_statuses() {
    let provider_failure = |status: u16, code: &str| {
        Err(CompletionError::ProviderFailure {
            status: Some(status),
            code: code.to_string(),
        })
    };
    let completions = Arc::new(ScriptedCompletions::with_replies(vec![
        provider_failure(401, "invalid_api_key"),
        provider_failure(429, "insufficient_quota"),
        provider_failure(404, "model_not_found"),
        Err(CompletionError::Timeout),
    ]));
    let app = memory_router(completions);

    let mut observed = Vec::new();
    for _ in 0..4 {
        let response = send_json(
            &app,
            request(
                Method::POST,
                "/v1/chat/medical",
                Some("owner-1"),
                Some(json!({ "message": "hello" })),
            ),
        )
        .await;
        observed.push((
            response.status,
            error_code(&response.body).map(str::to_string),
        ));
    }

    assert_eq!(
        observed,
        vec![
            (StatusCode::UNAUTHORIZED, Some("invalid_api_key".to_string())),
            (
                StatusCode::TOO_MANY_REQUESTS,
                Some("insufficient_quota".to_string())
            ),
            (StatusCode::BAD_REQUEST, Some("model_not_found".to_string())),
            (StatusCode::BAD_GATEWAY, Some("completion_failed".to_string())),
        ]
    );
}
