use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Role;

pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, CompletionError>> + Send + 'a>>;

/// One prior conversation turn, content already coerced to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub requester_id: Option<String>,
    pub user_message: String,
    pub history: Vec<HistoryTurn>,
}

impl CompletionRequest {
    pub fn new(user_message: impl Into<String>, history: Vec<HistoryTurn>) -> Self {
        Self {
            requester_id: None,
            user_message: user_message.into(),
            history,
        }
    }

    pub fn with_requester_id(mut self, requester_id: impl AsRef<str>) -> Self {
        let trimmed = requester_id.as_ref().trim();
        if !trimmed.is_empty() {
            self.requester_id = Some(trimmed.to_string());
        }
        self
    }
}

/// What the service claims it returned. Callers re-validate regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Structured,
    Plain,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: String,
    pub kind: CompletionKind,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request timed out")]
    Timeout,
    #[error("completion provider request failed: status={status:?} code={code}")]
    ProviderFailure { status: Option<u16>, code: String },
    #[error("completion provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

impl CompletionError {
    pub fn provider_code(&self) -> Option<&str> {
        match self {
            Self::ProviderFailure { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

pub trait CompletionService: Send + Sync {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a>;
}
