use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::HistoryResponse;

use super::super::errors::store_error_response;
use super::super::{AppState, OwnerContext};

pub(crate) async fn list_history(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> Response {
    match state
        .history
        .fetch_encounters(&owner.owner, state.history_limit)
        .await
    {
        Ok(history) => (StatusCode::OK, Json(HistoryResponse { history })).into_response(),
        Err(err) => store_error_response(err),
    }
}
