pub mod chat_completions;
pub mod contracts;
pub mod gateway;
pub mod prompts;
pub mod validation;

pub use chat_completions::{ChatCompletionsConfig, ChatCompletionsService, ModelRoute};
pub use contracts::{MainContent, Recommendation, StructuredContent, WhenToSeekHelp, output_schema};
pub use gateway::{
    CompletionError, CompletionFuture, CompletionKind, CompletionRequest, CompletionResponse,
    CompletionService, HistoryTurn, TokenUsage,
};
pub use prompts::{MEDICAL_SYSTEM_PROMPT, medical_system_prompt};
pub use validation::{
    REQUIRED_STRUCTURED_FIELDS, StructuredValidationError, validate_structured_json,
    validate_structured_value,
};
