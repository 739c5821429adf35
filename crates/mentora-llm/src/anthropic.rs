//! Anthropic - Claude API provider
//!
//! This module implements the Anthropic Claude provider using reqwest.

use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::{ProviderError, Result};
use crate::message::{Message, MessageRole};
use crate::provider::LlmProvider;
use crate::util::{
    error_for_status, error_for_transport, mask_api_key, resolve_model, sanitize_api_error,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Provider id used for routing and breakers
pub const PROVIDER_NAME: &str = "anthropic";

/// Anthropic API version
pub const API_VERSION: &str = "2023-06-01";

/// Available Anthropic models
pub const MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
];

/// Default model
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// The Messages API requires `max_tokens`
const DEFAULT_MAX_TOKENS: u32 = 1024;

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    r#type: String,
    message: String,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Anthropic provider configuration
#[derive(Clone)]
pub struct AnthropicConfig {
    /// API key
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Default max tokens
    pub default_max_tokens: u32,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ProviderError::auth(PROVIDER_NAME, "ANTHROPIC_API_KEY not set"))?;

        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let default_model =
            std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key)
            .with_base_url(base_url)
            .with_model(default_model))
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the default max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::network(PROVIDER_NAME, e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env()?)
    }

    /// Build the wire request; the system prompt travels in its own field
    fn build_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        let mut system_parts = Vec::new();
        if !request.system_prompt.is_empty() {
            system_parts.push(request.system_prompt.clone());
        }

        let mut messages = Vec::with_capacity(request.history.len() + 1);
        for msg in request.conversation() {
            match msg.role {
                // Stray system turns in history fold into the system field
                MessageRole::System => {
                    if !msg.content.is_empty() {
                        system_parts.push(msg.content);
                    }
                }
                MessageRole::User | MessageRole::Assistant => {
                    messages.push(convert_message(msg));
                }
            }
        }

        AnthropicRequest {
            model: resolve_model(&request.model, &self.config.default_model).to_string(),
            max_tokens: request.max_tokens.unwrap_or(self.config.default_max_tokens),
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
            messages,
            temperature: request.temperature,
        }
    }

    /// Send request to Anthropic API
    async fn send_request(&self, request: AnthropicRequest) -> Result<AnthropicResponse> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        debug!("Sending request to Anthropic: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| error_for_transport(PROVIDER_NAME, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| error_for_transport(PROVIDER_NAME, e))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<AnthropicError>(&body) {
                Ok(error) => format!("{}: {}", error.error.r#type, error.error.message),
                // Don't expose raw HTTP response body
                Err(_) => status.canonical_reason().unwrap_or("error").to_string(),
            };
            warn!(status = status.as_u16(), "Anthropic API error response");
            return Err(error_for_status(PROVIDER_NAME, status.as_u16(), &detail));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(PROVIDER_NAME, sanitize_api_error(&e.to_string()))
        })
    }
}

fn convert_message(msg: Message) -> AnthropicMessage {
    AnthropicMessage {
        role: if msg.role == MessageRole::Assistant {
            "assistant"
        } else {
            "user"
        },
        content: msg.content,
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(provider = PROVIDER_NAME, model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::auth(PROVIDER_NAME, "API key not configured"));
        }

        let anthropic_request = self.build_request(&request);

        let started = Instant::now();
        let response = self.send_request(anthropic_request).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ProviderError::invalid_response(
                PROVIDER_NAME,
                "No text content in response",
            ));
        }

        Ok(CompletionResponse {
            text,
            usage: TokenUsage::new(response.usage.input_tokens, response.usage.output_tokens),
            latency_ms,
            model: response.model,
            finish_reason: response.stop_reason,
        })
    }
}
