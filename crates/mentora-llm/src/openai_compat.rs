//! Shared Chat Completions client for OpenAI-compatible backends
//!
//! OpenAI and xAI Grok speak the same wire format; only the base URL,
//! credential and default model differ.

use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::{ProviderError, Result};
use crate::message::Message;
use crate::util::{error_for_status, error_for_transport, resolve_model, sanitize_api_error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Connection settings for one OpenAI-compatible backend
pub(crate) struct CompatClient {
    provider: &'static str,
    client: Client,
    base_url: String,
    api_key: String,
    default_model: String,
    default_max_tokens: Option<u32>,
}

impl CompatClient {
    pub(crate) fn new(
        provider: &'static str,
        base_url: String,
        api_key: String,
        default_model: String,
        default_max_tokens: Option<u32>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::network(provider, e.to_string()))?;

        Ok(Self {
            provider,
            client,
            base_url,
            api_key,
            default_model,
            default_max_tokens,
        })
    }

    pub(crate) fn default_model(&self) -> &str {
        &self.default_model
    }

    pub(crate) fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if !request.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: request.system_prompt.clone(),
            });
        }
        messages.extend(request.conversation().iter().map(convert_message));

        ChatRequest {
            model: resolve_model(&request.model, &self.default_model).to_string(),
            messages,
            max_tokens: request.max_tokens.or(self.default_max_tokens),
            temperature: request.temperature,
        }
    }

    pub(crate) async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::auth(self.provider, "API key not configured"));
        }

        let chat_request = self.build_request(request);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        debug!(provider = self.provider, model = %chat_request.model, "Sending chat completion request");

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| error_for_transport(self.provider, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| error_for_transport(self.provider, e))?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            return Err(error_for_status(self.provider, status.as_u16(), &detail));
        }

        let chat_response: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(self.provider, sanitize_api_error(&e.to_string()))
        })?;

        let choice = chat_response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::invalid_response(self.provider, "No choices in response")
        })?;

        let text = choice.message.content.unwrap_or_default();
        if text.is_empty() {
            return Err(ProviderError::invalid_response(
                self.provider,
                "Empty completion content",
            ));
        }

        let usage = chat_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            text,
            usage,
            latency_ms,
            model: chat_response.model,
            finish_reason: choice.finish_reason,
        })
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    ChatMessage {
        role: msg.role.as_str().to_string(),
        content: msg.content.clone(),
    }
}
