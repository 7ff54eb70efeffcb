//! LLM Client: the language-model gateway for the interviewer.
//!
//! ARCHITECTURAL RULE: workflow nodes never talk to a provider directly. They hold an
//! `Arc<dyn LanguageModelGateway>` and ask for one of the `OutputShape`s; this module
//! owns transport, retries, caching, and decoding model text into that shape.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, ModelProvider};

pub mod prompts;
pub mod shapes;

use prompts::JSON_ONLY_SYSTEM;
use shapes::{decode, OutputShape, ShapeMismatch, StructuredOutput};

const OPENAI_API_BASE: &str = "https://api.openai.com";
const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const OPENAI_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const ANTHROPIC_MESSAGES_PATH: &str = "/v1/messages";
/// First retry waits this long; each further retry doubles it.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Shape(#[from] ShapeMismatch),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Transport failures, rate limits, server errors, and malformed output are worth
    /// another attempt with the same prompt. Other client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(_) | LlmError::Shape(_) | LlmError::EmptyContent => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

/// One message of a gateway request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// Stateless prompt → structured result service. Implemented by `LlmClient` and by
/// deterministic fakes in tests.
#[async_trait]
pub trait LanguageModelGateway: Send + Sync {
    async fn invoke(
        &self,
        messages: &[PromptMessage],
        shape: OutputShape,
    ) -> Result<StructuredOutput, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Provider wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
    response_format: OpenAiResponseFormat,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Connection and behaviour settings for `LlmClient`, taken from `Config`.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: ModelProvider,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub enable_caching: bool,
    /// Overrides the provider's public endpoint (proxies, gateways, local stubs).
    pub api_base: Option<String>,
}

impl LlmSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider: config.model_provider,
            model: config.model_name.clone(),
            api_key: config.api_key().unwrap_or_default().to_string(),
            temperature: config.temperature,
            timeout: config.llm_timeout,
            max_retries: config.llm_max_retries,
            retry_base_delay: RETRY_BASE_DELAY,
            enable_caching: config.enable_llm_caching,
            api_base: config.llm_api_base.clone(),
        }
    }
}

/// The production gateway: OpenAI Chat Completions or Anthropic Messages over HTTP,
/// with per-request timeout, bounded retries, and an optional in-memory response cache.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
    cache: Arc<Mutex<HashMap<String, StructuredOutput>>>,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            settings,
            cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        let (default_base, path) = match self.settings.provider {
            ModelProvider::OpenAi => (OPENAI_API_BASE, OPENAI_COMPLETIONS_PATH),
            ModelProvider::Anthropic => (ANTHROPIC_API_BASE, ANTHROPIC_MESSAGES_PATH),
        };
        let base = self.settings.api_base.as_deref().unwrap_or(default_base);
        format!("{}{path}", base.trim_end_matches('/'))
    }

    /// Sends one request to the configured provider and returns the raw text content.
    async fn complete(&self, system: &str, messages: &[PromptMessage]) -> Result<String, LlmError> {
        let turns: Vec<WireMessage<'_>> = messages
            .iter()
            .filter(|m| m.role == PromptRole::User)
            .map(|m| WireMessage {
                role: "user",
                content: &m.content,
            })
            .collect();

        let request = match self.settings.provider {
            ModelProvider::OpenAi => {
                let mut wire = vec![WireMessage {
                    role: "system",
                    content: system,
                }];
                wire.extend(turns);
                self.client
                    .post(self.endpoint())
                    .bearer_auth(&self.settings.api_key)
                    .json(&OpenAiRequest {
                        model: &self.settings.model,
                        temperature: self.settings.temperature,
                        messages: wire,
                        response_format: OpenAiResponseFormat {
                            kind: "json_object",
                        },
                    })
            }
            ModelProvider::Anthropic => self
                .client
                .post(self.endpoint())
                .header("x-api-key", &self.settings.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&AnthropicRequest {
                    model: &self.settings.model,
                    max_tokens: MAX_TOKENS,
                    temperature: self.settings.temperature,
                    system,
                    messages: turns,
                }),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        match self.settings.provider {
            ModelProvider::OpenAi => {
                let parsed: OpenAiResponse = response.json().await?;
                if let Some(usage) = &parsed.usage {
                    debug!(
                        "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                        usage.prompt_tokens, usage.completion_tokens
                    );
                }
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .filter(|c| !c.trim().is_empty())
                    .ok_or(LlmError::EmptyContent)
            }
            ModelProvider::Anthropic => {
                let parsed: AnthropicResponse = response.json().await?;
                debug!(
                    "LLM call succeeded: input_tokens={}, output_tokens={}",
                    parsed.usage.input_tokens, parsed.usage.output_tokens
                );
                parsed
                    .content
                    .into_iter()
                    .find(|b| b.block_type == "text")
                    .and_then(|b| b.text)
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(LlmError::EmptyContent)
            }
        }
    }

    fn cached(&self, key: &str) -> Option<StructuredOutput> {
        if !self.settings.enable_caching {
            return None;
        }
        self.cache.lock().ok()?.get(key).cloned()
    }

    fn store(&self, key: String, output: &StructuredOutput) {
        if !self.settings.enable_caching {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, output.clone());
        }
    }
}

#[async_trait]
impl LanguageModelGateway for LlmClient {
    /// Retries on retryable failures with exponential backoff (base, 2x, 4x, ...)
    /// up to `max_retries` additional attempts, always resending the same prompt.
    async fn invoke(
        &self,
        messages: &[PromptMessage],
        shape: OutputShape,
    ) -> Result<StructuredOutput, LlmError> {
        let key = cache_key(messages, shape);
        if let Some(hit) = self.cached(&key) {
            debug!("LLM cache hit for {} request", shape.name());
            return Ok(hit);
        }

        let system = build_system_prompt(messages, shape);
        let attempts = self.settings.max_retries + 1;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = self.settings.retry_base_delay * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }
            attempt += 1;

            let result = self
                .complete(&system, messages)
                .await
                .and_then(|text| decode(shape, &text).map_err(LlmError::from));

            match result {
                Ok(output) => {
                    self.store(key, &output);
                    return Ok(output);
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(
                        "LLM {} attempt {}/{} failed: {e}. Retrying...",
                        shape.name(),
                        attempt,
                        attempts
                    );
                }
                Err(e) => {
                    warn!(
                        "LLM {} request failed after {} attempt(s): {e}",
                        shape.name(),
                        attempt
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Combines the caller's system messages with the JSON-only rule and the shape's schema.
fn build_system_prompt(messages: &[PromptMessage], shape: OutputShape) -> String {
    let mut parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == PromptRole::System)
        .map(|m| m.content.as_str())
        .collect();
    parts.push(JSON_ONLY_SYSTEM);
    parts.push(shape.schema_hint());
    parts.join("\n\n")
}

fn cache_key(messages: &[PromptMessage], shape: OutputShape) -> String {
    let body = messages
        .iter()
        .map(|m| format!("{:?}:{}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\u{1f}");
    format!("{}|{body}", shape.name())
}

/// Pulls `error.message` out of an OpenAI or Anthropic error body, falling back to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
