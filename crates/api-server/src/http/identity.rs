use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use shared::models::OwnerId;
use tracing::{Span, warn};

use super::OwnerContext;
use super::errors::unauthorized_response;

/// Header set by the fronting session layer once it has authenticated the caller.
pub(super) const OWNER_ID_HEADER: &str = "x-owner-id";
const MAX_OWNER_ID_LEN: usize = 256;

pub(super) async fn owner_middleware(mut req: Request, next: Next) -> Response {
    let owner = req
        .headers()
        .get(OWNER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|raw| raw.len() <= MAX_OWNER_ID_LEN)
        .and_then(OwnerId::new);

    let Some(owner) = owner else {
        warn!("missing or invalid owner identity header");
        return unauthorized_response();
    };

    Span::current().record("owner", owner.as_str());
    req.extensions_mut().insert(OwnerContext { owner });
    next.run(req).await
}
