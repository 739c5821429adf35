//! LLM provider resolution
//!
//! Builds one adapter per enabled provider that has a key, from its
//! `[providers.<name>]` section with the conventional environment variable
//! as fallback.

use super::config::{AppConfig, ProviderSettings};
use anyhow::Result;
use mentora_llm::{
    AnthropicConfig, AnthropicProvider, GeminiConfig, GeminiProvider, GrokConfig, GrokProvider,
    LlmProvider, OpenAiConfig, OpenAiProvider,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Providers this build knows how to construct
pub const KNOWN_PROVIDERS: [&str; 4] = ["gemini", "anthropic", "openai", "grok"];

/// Build every enabled provider that has credentials
pub fn resolve_providers(config: &AppConfig) -> Vec<Arc<dyn LlmProvider>> {
    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

    for (name, settings) in &config.providers {
        if !settings.enabled {
            debug!(provider = %name, "Provider disabled in configuration");
            continue;
        }
        match build_provider(name, settings, config.orchestrator.max_tokens) {
            Ok(Some(provider)) => {
                info!(provider = %name, model = provider.default_model(), "Registered provider");
                providers.push(provider);
            }
            Ok(None) => warn!(provider = %name, "Unknown provider in configuration, ignoring"),
            Err(e) => debug!(provider = %name, error = %e, "Provider not available"),
        }
    }

    if providers.is_empty() {
        warn!("No LLM providers available. Set GEMINI_API_KEY, ANTHROPIC_API_KEY, OPENAI_API_KEY or XAI_API_KEY.");
    }
    providers
}

fn build_provider(
    name: &str,
    settings: &ProviderSettings,
    max_tokens: Option<u32>,
) -> Result<Option<Arc<dyn LlmProvider>>> {
    let timeout = settings.timeout_secs.map(Duration::from_secs);

    let provider: Arc<dyn LlmProvider> = match name {
        "gemini" => {
            let mut config = match settings.api_key() {
                Some(key) => GeminiConfig::new(key),
                None => GeminiConfig::from_env()?,
            };
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url);
            }
            if let Some(model) = &settings.model {
                config = config.with_model(model);
            }
            if let Some(max_tokens) = max_tokens {
                config = config.with_max_tokens(max_tokens);
            }
            if let Some(timeout) = timeout {
                config = config.with_timeout(timeout);
            }
            Arc::new(GeminiProvider::new(config)?)
        }
        "anthropic" => {
            let mut config = match settings.api_key() {
                Some(key) => AnthropicConfig::new(key),
                None => AnthropicConfig::from_env()?,
            };
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url);
            }
            if let Some(model) = &settings.model {
                config = config.with_model(model);
            }
            if let Some(max_tokens) = max_tokens {
                config = config.with_max_tokens(max_tokens);
            }
            if let Some(timeout) = timeout {
                config = config.with_timeout(timeout);
            }
            Arc::new(AnthropicProvider::new(config)?)
        }
        "openai" => {
            let mut config = match settings.api_key() {
                Some(key) => OpenAiConfig::new(key),
                None => OpenAiConfig::from_env()?,
            };
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url);
            }
            if let Some(model) = &settings.model {
                config = config.with_model(model);
            }
            if let Some(max_tokens) = max_tokens {
                config = config.with_max_tokens(max_tokens);
            }
            if let Some(timeout) = timeout {
                config = config.with_timeout(timeout);
            }
            Arc::new(OpenAiProvider::new(config)?)
        }
        "grok" => {
            let mut config = match settings.api_key() {
                Some(key) => GrokConfig::new(key),
                None => GrokConfig::from_env()?,
            };
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url);
            }
            if let Some(model) = &settings.model {
                config = config.with_model(model);
            }
            if let Some(max_tokens) = max_tokens {
                config = config.with_max_tokens(max_tokens);
            }
            if let Some(timeout) = timeout {
                config = config.with_timeout(timeout);
            }
            Arc::new(GrokProvider::new(config)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(provider))
}
