//! OpenAI - GPT-4 family provider
//!
//! Talks to the Chat Completions API over reqwest.

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::{ProviderError, Result};
use crate::openai_compat::CompatClient;
use crate::provider::LlmProvider;
use crate::util::mask_api_key;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Provider id used for routing and breakers
pub const PROVIDER_NAME: &str = "openai";

/// Default API base URL
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// GPT-4 family models
pub const MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4"];

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for the OpenAI provider
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key for authentication
    pub api_key: String,
    /// Base URL (override for proxies or tests)
    pub base_url: String,
    /// Default model to use for completions
    pub default_model: String,
    /// Max tokens when the request does not set one
    pub default_max_tokens: Option<u32>,
    /// Request timeout duration
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    /// Creates a new configuration with the given API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Creates configuration from `OPENAI_API_KEY` (and optional
    /// `OPENAI_BASE_URL` / `OPENAI_MODEL`)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::auth(PROVIDER_NAME, "OPENAI_API_KEY not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.default_model = model;
        }
        Ok(config)
    }

    /// Sets a custom base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Sets the default max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = Some(max_tokens);
        self
    }

    /// Sets the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// OpenAI GPT-4 provider
pub struct OpenAiProvider {
    inner: CompatClient,
}

impl OpenAiProvider {
    /// Creates a new provider
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let inner = CompatClient::new(
            PROVIDER_NAME,
            config.base_url,
            config.api_key,
            config.default_model,
            config.default_max_tokens,
            config.timeout,
        )?;
        Ok(Self { inner })
    }

    /// Creates a provider from environment variables
    ///
    /// # Errors
    ///
    /// Returns an auth error if `OPENAI_API_KEY` is not set
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    #[instrument(skip(self, request), fields(provider = PROVIDER_NAME, history = request.history.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.inner.complete(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::new("sk-test-1234567890")
            .with_base_url("http://localhost:9999/v1")
            .with_model("gpt-4-turbo")
            .with_max_tokens(256)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url, "http://localhost:9999/v1");
        assert_eq!(config.default_model, "gpt-4-turbo");
        assert_eq!(config.default_max_tokens, Some(256));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = OpenAiConfig::new("sk-proj-abcdefghijklmnop");
        let debug = format!("{config:?}");
        assert!(!debug.contains("abcdefghijklmnop"));
        assert!(debug.contains("sk-p...mnop"));
    }

    #[test]
    fn test_provider_identity() {
        let provider = OpenAiProvider::new(OpenAiConfig::new("sk-test-1234567890")).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), DEFAULT_MODEL);
    }
}
