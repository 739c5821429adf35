//! Gemini - Google Gemini API provider
//!
//! Uses the `generateContent` endpoint of the Generative Language API. The
//! API key travels as a query parameter, so request URLs are never logged.

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
pub const PROVIDER_NAME: &str = "gemini";

/// Gemini API base URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Available Gemini models
pub const MODELS: &[&str] = &["gemini-2.0-flash", "gemini-1.5-pro", "gemini-1.5-flash"];

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    /// May be absent for empty responses
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Gemini provider configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key (appended as `?key=` in URL)
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Max output tokens when the request does not set one
    pub default_max_tokens: Option<u32>,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create configuration from `GEMINI_API_KEY` (falling back to
    /// `GOOGLE_API_KEY`) and optional `GEMINI_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| ProviderError::auth(PROVIDER_NAME, "GEMINI_API_KEY not set"))?;
        let default_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key).with_model(default_model))
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
        self.default_max_tokens = Some(max_tokens);
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::network(PROVIDER_NAME, e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let mut system_parts = Vec::new();
        if !request.system_prompt.is_empty() {
            system_parts.push(request.system_prompt.clone());
        }

        let mut contents = Vec::with_capacity(request.history.len() + 1);
        for msg in request.conversation() {
            if msg.role == MessageRole::System {
                if !msg.content.is_empty() {
                    system_parts.push(msg.content);
                }
                continue;
            }
            contents.push(convert_message(msg));
        }

        let system_instruction = (!system_parts.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(system_parts.join("\n\n")),
            }],
        });

        let max_output_tokens = request.max_tokens.or(self.config.default_max_tokens);
        let generation_config = (request.temperature.is_some() || max_output_tokens.is_some())
            .then_some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens,
            });

        GeminiRequest {
            contents,
            system_instruction,
            generation_config,
        }
    }

    async fn send_request(&self, model: &str, request: &GeminiRequest) -> Result<GeminiResponse> {
        // Don't log the full URL (contains the API key)
        debug!("Sending request to Gemini model: {}", model);

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| error_for_transport(PROVIDER_NAME, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| error_for_transport(PROVIDER_NAME, e))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<GeminiError>(&body) {
                Ok(error) => {
                    warn!(
                        status = status.as_u16(),
                        error_status = %error.error.status,
                        "Gemini API error response"
                    );
                    error.error.message
                }
                Err(_) => status.canonical_reason().unwrap_or("error").to_string(),
            };
            return Err(error_for_status(PROVIDER_NAME, status.as_u16(), &detail));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(PROVIDER_NAME, sanitize_api_error(&e.to_string()))
        })
    }
}

fn convert_message(msg: Message) -> GeminiContent {
    let role = match msg.role {
        MessageRole::Assistant => "model",
        _ => "user",
    };
    GeminiContent {
        role: Some(role.to_string()),
        parts: vec![GeminiPart {
            text: Some(msg.content),
        }],
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
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

        let model = resolve_model(&request.model, &self.config.default_model).to_string();
        let gemini_request = self.build_request(&request);

        let started = Instant::now();
        let response = self.send_request(&model, &gemini_request).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::invalid_response(PROVIDER_NAME, "No candidates in response")
        })?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            // Safety and recitation blocks come back as a candidate without text
            return Err(ProviderError::invalid_response(
                PROVIDER_NAME,
                format!(
                    "Empty response (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            ));
        }

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count.unwrap_or(0),
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            text,
            usage,
            latency_ms,
            model: response.model_version.unwrap_or(model),
            finish_reason: candidate.finish_reason,
        })
    }
}
