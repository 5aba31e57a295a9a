use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::llm::CompletionService;
use shared::models::OwnerId;
use shared::repos::HistoryStore;

mod chat;
mod errors;
mod health;
mod identity;
mod observability;

#[derive(Clone)]
pub struct AppState {
    pub history: Arc<dyn HistoryStore>,
    pub completions: Arc<dyn CompletionService>,
    /// Cap applied to history listings.
    pub history_limit: usize,
}

#[derive(Clone, Debug)]
pub(super) struct OwnerContext {
    pub(super) owner: OwnerId,
}

pub fn build_router(app_state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/v1/chat/medical", post(chat::medical::medical_chat))
        .route("/v1/chat/encounter", post(chat::encounter::save_encounter))
        .route("/v1/chat/history", get(chat::history::list_history))
        .layer(middleware::from_fn(identity::owner_middleware))
        .with_state(app_state);

    public_routes
        .merge(protected_routes)
        .layer(middleware::from_fn(
            observability::request_observability_middleware,
        ))
}
