use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::contracts::StructuredContent;
use crate::llm::gateway::TokenUsage;

/// Identity of the user owning an encounter.
///
/// Supplied explicitly by the caller (session layer); never read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Wire tag stored next to message content: `json` for structured payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Plain(String),
    Structured(StructuredContent),
}

impl MessageContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Plain(_) => ContentKind::Text,
            Self::Structured(_) => ContentKind::Json,
        }
    }

    /// Plain-text form used for transmission and previews. Structured content is
    /// stringified as JSON.
    pub fn to_transport_text(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Structured(content) => content.to_value().to_string(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Plain(text) => Value::String(text.clone()),
            Self::Structured(content) => content.to_value(),
        }
    }

    /// Builds content from a stored value. Objects are read leniently as structured
    /// content; any other non-string value is kept as its JSON text.
    pub fn from_value(value: Value, kind: Option<ContentKind>) -> Self {
        match value {
            Value::String(text) => Self::Plain(text),
            object @ Value::Object(_) if kind != Some(ContentKind::Text) => {
                Self::Structured(StructuredContent::from_value_lenient(&object))
            }
            other => Self::Plain(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MessageWire", into = "MessageWire")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(id: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: MessageContent::Plain(text.into()),
            timestamp,
        }
    }

    pub fn assistant(
        id: impl Into<String>,
        content: MessageContent,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageWire {
    id: String,
    role: Role,
    content: Value,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "type", default)]
    kind: Option<ContentKind>,
}

impl From<MessageWire> for Message {
    fn from(wire: MessageWire) -> Self {
        Self {
            id: wire.id,
            role: wire.role,
            content: MessageContent::from_value(wire.content, wire.kind),
            timestamp: wire.timestamp,
        }
    }
}

impl From<Message> for MessageWire {
    fn from(message: Message) -> Self {
        Self {
            kind: Some(message.content.kind()),
            content: message.content.to_value(),
            id: message.id,
            role: message.role,
            timestamp: message.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub encounter_id: String,
    #[serde(rename = "userId")]
    pub owner: OwnerId,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurnPayload {
    pub role: Role,
    pub content: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurnPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub message: Value,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEncounterRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub encounter_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEncounterResponse {
    pub message: String,
    pub encounter_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<Encounter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
