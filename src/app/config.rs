//! Application configuration types
//!
//! Mirrors the sections of `config/default.toml` and converts them into the
//! library configuration types.

use anyhow::{bail, Result};
use mentora_core::{CircuitBreakerConfig, OrchestratorConfig, RetryConfig};
use mentora_llm::util::mask_api_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; empty means the default location
    #[serde(default)]
    pub path: String,
}

impl DatabaseConfig {
    pub fn path(&self) -> Option<PathBuf> {
        let path = self.path.trim();
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
    #[serde(default = "default_true")]
    pub prefer_last_successful: bool,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_priority() -> Vec<String> {
    mentora_core::orchestrator::DEFAULT_PRIORITY
        .iter()
        .map(|p| (*p).to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_history_window() -> usize {
    mentora_core::persona::DEFAULT_HISTORY_WINDOW
}

fn default_attempt_timeout() -> u64 {
    30
}

fn default_turn_timeout() -> u64 {
    120
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            prefer_last_successful: true,
            history_window: default_history_window(),
            attempt_timeout_secs: default_attempt_timeout(),
            turn_timeout_secs: default_turn_timeout(),
            max_tokens: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_fail_max")]
    pub fail_max: u32,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_secs: u64,
}

fn default_fail_max() -> u32 {
    5
}

fn default_reset_timeout() -> u64 {
    30
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            fail_max: default_fail_max(),
            reset_timeout_secs: default_reset_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    10_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter: false,
        }
    }
}

/// Per-provider settings; the key comes from the environment when unset
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            model: None,
            timeout_secs: None,
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_deref().map(mask_api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderSettings {
    /// Configured key, ignoring blanks
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl AppConfig {
    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.priority.is_empty() {
            bail!("orchestrator.priority must list at least one provider");
        }
        if self.breaker.fail_max == 0 {
            bail!("breaker.fail_max must be at least 1");
        }
        if self.breaker.reset_timeout_secs == 0 {
            bail!("breaker.reset_timeout_secs must be greater than 0");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            bail!("retry.max_delay_ms must not be smaller than retry.base_delay_ms");
        }
        if self.orchestrator.attempt_timeout_secs == 0 || self.orchestrator.turn_timeout_secs == 0
        {
            bail!("orchestrator timeouts must be greater than 0");
        }
        self.orchestrator_config().validate()?;
        Ok(())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let o = &self.orchestrator;
        OrchestratorConfig::new()
            .with_priority(o.priority.iter().map(|p| p.trim().to_lowercase()))
            .with_prefer_last_successful(o.prefer_last_successful)
            .with_history_window(o.history_window)
            .with_attempt_timeout(Duration::from_secs(o.attempt_timeout_secs))
            .with_max_tokens(o.max_tokens)
            .with_temperature(o.temperature)
            .with_retry(self.retry_config())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.retry.max_attempts)
            .with_initial_delay(Duration::from_millis(self.retry.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .with_jitter(self.retry.jitter)
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.breaker.fail_max)
            .with_reset_timeout(Duration::from_secs(self.breaker.reset_timeout_secs))
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.orchestrator.turn_timeout_secs)
    }
}
