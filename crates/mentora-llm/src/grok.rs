//! Grok - xAI provider
//!
//! xAI exposes an OpenAI-compatible Chat Completions endpoint, so this
//! adapter shares its wire types with the OpenAI provider.

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::{ProviderError, Result};
use crate::openai_compat::CompatClient;
use crate::provider::LlmProvider;
use crate::util::mask_api_key;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Provider id used for routing and breakers
pub const PROVIDER_NAME: &str = "grok";

/// xAI API base URL
pub const XAI_API_BASE: &str = "https://api.x.ai/v1";

/// Available Grok models
pub const MODELS: &[&str] = &["grok-3", "grok-3-mini", "grok-2-1212"];

/// Default Grok model
pub const DEFAULT_MODEL: &str = "grok-3-mini";

/// Grok provider configuration
#[derive(Clone)]
pub struct GrokConfig {
    /// API key
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Max tokens when the request does not set one
    pub default_max_tokens: Option<u32>,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for GrokConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrokConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GrokConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: XAI_API_BASE.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create configuration from `XAI_API_KEY` (and optional `XAI_MODEL`)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("XAI_API_KEY")
            .map_err(|_| ProviderError::auth(PROVIDER_NAME, "XAI_API_KEY not set"))?;
        let default_model =
            std::env::var("XAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

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

/// xAI Grok provider
pub struct GrokProvider {
    inner: CompatClient,
}

impl GrokProvider {
    /// Create a new Grok provider
    pub fn new(config: GrokConfig) -> Result<Self> {
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

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GrokConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl LlmProvider for GrokProvider {
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
