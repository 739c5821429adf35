//! Error types for mentora-core
//!
//! This module provides error types and user-friendly error formatting.

use crate::orchestrator::ProviderFailure;
use mentora_llm::ProviderError;
use thiserror::Error;
use uuid::Uuid;

/// Shown to end users when no provider could answer a turn
pub const UNAVAILABLE_MESSAGE: &str =
    "The assistant is temporarily unavailable. Please retry in a moment.";

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Every candidate provider failed or was blocked by its breaker
    #[error("all providers unavailable: {}", summarize(.failures))]
    AllProvidersUnavailable {
        /// Conversation the failed turn belongs to
        conversation_id: Uuid,
        /// Per-provider reasons, in the order candidates were tried
        failures: Vec<ProviderFailure>,
    },

    /// The caller sent something we cannot process
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(String),

    /// The turn was cancelled before a provider answered
    #[error("turn cancelled")]
    Cancelled,

    /// Configuration error (invalid settings)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single provider call failed outside of orchestration
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn summarize(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no providers configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
///
/// Provides human-readable error messages and suggestions for fixing.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::AllProvidersUnavailable { .. } => UNAVAILABLE_MESSAGE.to_string(),
            Error::InvalidInput(msg) => format!("Your message could not be sent: {msg}"),
            Error::NotFound(what) => format!("Could not find {what}."),
            Error::Storage(_) => "Conversation storage is unavailable.".to_string(),
            Error::Cancelled => "The request was cancelled.".to_string(),
            Error::Configuration(msg) => format!("Configuration error: {msg}"),
            Error::Provider(e) => format!("The {} provider failed ({}).", e.provider, e.kind),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::AllProvidersUnavailable { failures, .. } if failures.is_empty() => Some(
                "Configure at least one provider API key (e.g. GEMINI_API_KEY).".to_string(),
            ),
            Error::AllProvidersUnavailable { .. } => Some(
                "Run `mentora providers` to see which providers are failing.".to_string(),
            ),
            Error::InvalidInput(_) => Some("Type a non-empty message and try again.".to_string()),
            Error::Storage(_) => {
                Some("Check the [database] path in config/default.toml.".to_string())
            }
            Error::Configuration(_) => Some(
                "Check config/default.toml, config/local.toml or MENTORA_* variables.".to_string(),
            ),
            Error::Provider(e) if e.kind == mentora_llm::ProviderErrorKind::Auth => Some(format!(
                "Set the API key for {} in its environment variable or config.",
                e.provider
            )),
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::FailureReason;
    use mentora_llm::ProviderErrorKind;
    use std::time::Duration;

    fn unavailable() -> Error {
        Error::AllProvidersUnavailable {
            conversation_id: Uuid::new_v4(),
            failures: vec![
                ProviderFailure::new(
                    "gemini",
                    FailureReason::CircuitOpen {
                        retry_after_ms: Duration::from_secs(12).as_millis() as u64,
                    },
                ),
                ProviderFailure::new(
                    "anthropic",
                    FailureReason::Provider {
                        error: ProviderError::new("anthropic", ProviderErrorKind::Server, "boom"),
                        attempts: 1,
                    },
                ),
            ],
        }
    }

    #[test]
    fn test_unavailable_user_message() {
        let error = unavailable();
        assert_eq!(error.user_message(), UNAVAILABLE_MESSAGE);
        assert!(error.suggestion().unwrap().contains("mentora providers"));
    }

    #[test]
    fn test_unavailable_display_lists_reasons() {
        let text = unavailable().to_string();
        assert!(text.contains("gemini"));
        assert!(text.contains("circuit open"));
        assert!(text.contains("anthropic"));
    }

    #[test]
    fn test_validation_is_distinct_from_unavailable() {
        let error = Error::InvalidInput("message is empty".to_string());
        assert_ne!(error.user_message(), UNAVAILABLE_MESSAGE);
        assert!(error.user_message().contains("message is empty"));
    }

    #[test]
    fn test_format_error_for_cli() {
        let error = Error::AllProvidersUnavailable {
            conversation_id: Uuid::new_v4(),
            failures: Vec::new(),
        };
        let output = format_error_for_cli(&error);
        assert!(output.contains(UNAVAILABLE_MESSAGE));
        assert!(output.contains("GEMINI_API_KEY"));
    }
}
