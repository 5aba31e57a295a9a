use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::{SaveEncounterRequest, SaveEncounterResponse};
use tracing::info;

use super::super::errors::{bad_request_response, store_error_response};
use super::super::{AppState, OwnerContext};

/// Creates or replaces an encounter. `201` when the record is new, `200` when
/// an existing one was updated.
pub(crate) async fn save_encounter(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(req): Json<SaveEncounterRequest>,
) -> Response {
    if req.messages.is_empty() {
        return bad_request_response("no_messages", "No messages to save");
    }

    let ack = match state
        .history
        .upsert_encounter(&owner.owner, req.encounter_id.as_deref(), &req.messages)
        .await
    {
        Ok(ack) => ack,
        Err(err) => return store_error_response(err),
    };

    info!(
        encounter_id = %ack.encounter_id,
        message_count = req.messages.len(),
        created = ack.created,
        "encounter saved"
    );

    let (status, message) = if ack.created {
        (StatusCode::CREATED, "Encounter saved")
    } else {
        (StatusCode::OK, "Encounter updated")
    };
    (
        status,
        Json(SaveEncounterResponse {
            message: message.to_string(),
            encounter_id: ack.encounter_id,
        }),
    )
        .into_response()
}
