use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::gateway::{
    CompletionError, CompletionFuture, CompletionKind, CompletionRequest, CompletionResponse,
    CompletionService, TokenUsage,
};
use super::prompts::medical_system_prompt;
use super::validation::validate_structured_json;
use crate::config::ConfigError;
use crate::config_env::{
    optional_trimmed_env, parse_bool_env, parse_u32_env, parse_u64_env, require_non_empty_env,
};

const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 250;

const MAX_TOKENS: u32 = 1500;
const TEMPERATURE: f32 = 0.7;
const PRESENCE_PENALTY: f32 = 0.1;
const FREQUENCY_PENALTY: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct ModelRoute {
    pub primary_model: String,
    pub fallback_model: Option<String>,
}

impl ModelRoute {
    fn candidate_models(&self) -> Vec<&str> {
        let mut candidates = Vec::new();
        if !self.primary_model.is_empty() {
            candidates.push(self.primary_model.as_str());
        }

        if let Some(fallback_model) = self.fallback_model.as_deref()
            && !fallback_model.is_empty()
            && fallback_model != self.primary_model
        {
            candidates.push(fallback_model);
        }

        candidates
    }
}

#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    pub chat_completions_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_backoff_ms: u64,
    /// Requests `response_format: json_object` from the provider.
    pub json_mode: bool,
    pub model_route: ModelRoute,
}

impl ChatCompletionsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = require_non_empty_env("COMPLETIONS_API_KEY")?;
        if !api_key.starts_with("sk-") {
            return Err(ConfigError::InvalidConfiguration(
                "COMPLETIONS_API_KEY has an invalid format".to_string(),
            ));
        }

        let chat_completions_url = optional_trimmed_env("COMPLETIONS_URL")
            .unwrap_or_else(|| DEFAULT_CHAT_COMPLETIONS_URL.to_string());
        if !chat_completions_url.starts_with("http://")
            && !chat_completions_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidConfiguration(
                "COMPLETIONS_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            chat_completions_url,
            api_key,
            timeout_ms: parse_u64_env("COMPLETIONS_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            max_retries: parse_u32_env("COMPLETIONS_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_base_backoff_ms: parse_u64_env(
                "COMPLETIONS_RETRY_BASE_BACKOFF_MS",
                DEFAULT_RETRY_BASE_BACKOFF_MS,
            )?,
            json_mode: parse_bool_env("COMPLETIONS_JSON_MODE", true)?,
            model_route: ModelRoute {
                primary_model: optional_trimmed_env("COMPLETIONS_MODEL")
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                fallback_model: optional_trimmed_env("COMPLETIONS_FALLBACK_MODEL"),
            },
        })
    }
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct ChatCompletionsService {
    client: reqwest::Client,
    config: ChatCompletionsConfig,
    system_prompt: String,
}

impl ChatCompletionsService {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| {
                ConfigError::InvalidConfiguration(format!(
                    "failed to build completions http client: {err}"
                ))
            })?;

        Ok(Self {
            client,
            config,
            system_prompt: medical_system_prompt(),
        })
    }

    async fn complete_with_model(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ModelAttemptError> {
        let mut attempt = 0_u32;

        loop {
            match self.send_once(model, request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if err.retryable && attempt < self.config.max_retries {
                        let backoff_multiplier = 2_u64.saturating_pow(attempt);
                        let backoff_ms = self
                            .config
                            .retry_base_backoff_ms
                            .saturating_mul(backoff_multiplier);
                        debug!(model, attempt, backoff_ms, "retrying completion request");
                        sleep(Duration::from_millis(backoff_ms)).await;
                        attempt = attempt.saturating_add(1);
                        continue;
                    }

                    return Err(ModelAttemptError {
                        error: err.error,
                        fallback_allowed: err.fallback_allowed,
                    });
                }
            }
        }
    }

    async fn send_once(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SendAttemptError> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(json!({ "role": "system", "content": self.system_prompt }));
        messages.extend(
            request
                .history
                .iter()
                .map(|turn| json!({ "role": turn.role.as_str(), "content": turn.content })),
        );
        messages.push(json!({ "role": "user", "content": request.user_message }));

        let mut request_body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "presence_penalty": PRESENCE_PENALTY,
            "frequency_penalty": FREQUENCY_PENALTY,
        });
        if self.config.json_mode {
            request_body["response_format"] = json!({ "type": "json_object" });
        }
        if let Some(requester_id) = request.requester_id.as_deref() {
            request_body["user"] = json!(requester_id);
        }

        let response = self
            .client
            .post(&self.config.chat_completions_url)
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SendAttemptError::retryable(CompletionError::Timeout, true)
                } else {
                    SendAttemptError::retryable(
                        CompletionError::ProviderFailure {
                            status: None,
                            code: "request_unavailable".to_string(),
                        },
                        true,
                    )
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|_| {
            SendAttemptError::non_retryable(
                CompletionError::InvalidProviderPayload("response_body_read_failed".to_string()),
                true,
            )
        })?;

        if !status.is_success() {
            let provider_code = parse_provider_error_code(&body);
            let fallback_allowed =
                status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN;
            return Err(SendAttemptError {
                retryable: is_retryable_status(status),
                fallback_allowed,
                error: CompletionError::ProviderFailure {
                    status: Some(status.as_u16()),
                    code: provider_code,
                },
            });
        }

        let parsed: ChatCompletionsSuccessResponse = serde_json::from_str(&body).map_err(|_| {
            SendAttemptError::non_retryable(
                CompletionError::InvalidProviderPayload("response_json_parse_failed".to_string()),
                true,
            )
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                SendAttemptError::non_retryable(
                    CompletionError::InvalidProviderPayload("missing_choice".to_string()),
                    true,
                )
            })?;

        let content = match content {
            Value::String(raw) => raw,
            value @ Value::Object(_) => value.to_string(),
            _ => {
                return Err(SendAttemptError::non_retryable(
                    CompletionError::InvalidProviderPayload(
                        "unsupported_content_shape".to_string(),
                    ),
                    true,
                ));
            }
        };
        if content.trim().is_empty() {
            return Err(SendAttemptError::non_retryable(
                CompletionError::InvalidProviderPayload("empty_content".to_string()),
                true,
            ));
        }

        Ok(CompletionResponse {
            kind: classify_content(&content),
            content,
            model: parsed.model.or_else(|| Some(model.to_string())),
            usage: parsed.usage.map(|usage| TokenUsage {
                prompt_tokens: clamp_u64_to_u32(usage.prompt_tokens.unwrap_or(0)),
                completion_tokens: clamp_u64_to_u32(usage.completion_tokens.unwrap_or(0)),
                total_tokens: clamp_u64_to_u32(usage.total_tokens.unwrap_or(0)),
            }),
        })
    }
}

impl CompletionService for ChatCompletionsService {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            let candidate_models = self.config.model_route.candidate_models();

            for (index, model) in candidate_models.iter().enumerate() {
                match self.complete_with_model(model, &request).await {
                    Ok(response) => return Ok(response),
                    Err(model_err) => {
                        let has_more_candidates = index + 1 < candidate_models.len();
                        if has_more_candidates && model_err.fallback_allowed {
                            warn!(model, error = %model_err.error, "completion failed; trying fallback model");
                            continue;
                        }
                        return Err(model_err.error);
                    }
                }
            }

            Err(CompletionError::ProviderFailure {
                status: None,
                code: "no_model_candidates".to_string(),
            })
        })
    }
}

fn classify_content(content: &str) -> CompletionKind {
    match validate_structured_json(content) {
        Ok(_) => CompletionKind::Structured,
        Err(err) => {
            debug!(reason = %err, "completion output is not structured; treating as plain text");
            CompletionKind::Plain
        }
    }
}

#[derive(Debug)]
struct SendAttemptError {
    error: CompletionError,
    retryable: bool,
    fallback_allowed: bool,
}

impl SendAttemptError {
    fn retryable(error: CompletionError, fallback_allowed: bool) -> Self {
        Self {
            error,
            retryable: true,
            fallback_allowed,
        }
    }

    fn non_retryable(error: CompletionError, fallback_allowed: bool) -> Self {
        Self {
            error,
            retryable: false,
            fallback_allowed,
        }
    }
}

#[derive(Debug)]
struct ModelAttemptError {
    error: CompletionError,
    fallback_allowed: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsSuccessResponse {
    model: Option<String>,
    choices: Vec<ChatCompletionsChoice>,
    usage: Option<ChatCompletionsUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsChoice {
    message: ChatCompletionsMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsMessage {
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        code: Option<Value>,
    }

    let parsed = serde_json::from_str::<ProviderErrorEnvelope>(body).ok();
    let Some(provider_error_code) = parsed
        .and_then(|envelope| envelope.error)
        .and_then(|details| details.code)
    else {
        return "unknown".to_string();
    };

    match provider_error_code {
        Value::String(code) => code,
        Value::Number(code) => code.to_string(),
        _ => "unknown".to_string(),
    }
}

fn clamp_u64_to_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
