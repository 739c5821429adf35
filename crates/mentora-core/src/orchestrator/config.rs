//! Orchestrator configuration
//!
//! Contains configuration types for the orchestrator:
//! - `OrchestratorConfig` for provider ordering, timeouts and retry
//! - `TurnInput` for one chat turn

use crate::error::{Error, Result};
use crate::model::SessionHints;
use crate::persona::DEFAULT_HISTORY_WINDOW;
use crate::utils::RetryConfig;
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

/// Provider priority used when none is configured
pub const DEFAULT_PRIORITY: [&str; 4] = ["gemini", "anthropic", "openai", "grok"];

/// Input for one turn
#[derive(Debug, Clone)]
pub struct TurnInput {
    /// User sending the message
    pub user_id: String,
    /// Existing conversation; a new one is created when absent
    pub conversation_id: Option<Uuid>,
    /// The user's message
    pub message: String,
    /// Session-level context
    pub hints: SessionHints,
}

impl TurnInput {
    /// Create a new input
    #[must_use]
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: None,
            message: message.into(),
            hints: SessionHints::default(),
        }
    }

    /// Continue an existing conversation
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: Uuid) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    /// Attach session hints
    #[must_use]
    pub fn with_hints(mut self, hints: SessionHints) -> Self {
        self.hints = hints;
        self
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Provider ids in the order they are tried
    pub priority: Vec<String>,
    /// Move the conversation's last successful provider to the front
    pub prefer_last_successful: bool,
    /// Past turns (user message plus reply) sent with each turn
    pub history_window: usize,
    /// Time box for a single provider attempt
    pub attempt_timeout: Duration,
    /// Completion token ceiling passed to providers
    pub max_tokens: Option<u32>,
    /// Sampling temperature passed to providers
    pub temperature: Option<f32>,
    /// Retry policy applied per provider
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY.iter().map(|p| (*p).to_string()).collect(),
            prefer_last_successful: true,
            history_window: DEFAULT_HISTORY_WINDOW,
            attempt_timeout: Duration::from_secs(30),
            max_tokens: Some(1024),
            temperature: Some(0.7),
            retry: RetryConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider priority
    #[must_use]
    pub fn with_priority<I, S>(mut self, priority: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = priority.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable last-successful-provider preference
    #[must_use]
    pub fn with_prefer_last_successful(mut self, enabled: bool) -> Self {
        self.prefer_last_successful = enabled;
        self
    }

    /// Set the history window
    #[must_use]
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the completion token ceiling
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Check the configuration for values the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.priority.is_empty() {
            return Err(Error::Configuration(
                "orchestrator.priority must list at least one provider".to_string(),
            ));
        }
        if self.priority.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::Configuration(
                "orchestrator.priority contains an empty provider id".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.priority.iter().find(|p| !seen.insert(p.trim())) {
            return Err(Error::Configuration(format!(
                "orchestrator.priority lists \"{}\" more than once",
                dup.trim()
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(Error::Configuration(
                "orchestrator.attempt_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
