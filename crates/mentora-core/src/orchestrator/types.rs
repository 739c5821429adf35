//! Orchestrator types
//!
//! Contains the result and failure types of a turn:
//! - `AssistantReply` for a successful turn
//! - `ProviderFailure` and `FailureReason` for candidates that did not answer

use crate::model::StoredMessage;
use mentora_llm::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why a candidate provider did not produce the answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// The breaker refused the call; the provider was not contacted
    CircuitOpen {
        /// Time until the breaker admits a probe
        retry_after_ms: u64,
    },
    /// The provider was called and failed
    Provider {
        /// Last error returned by the adapter
        error: ProviderError,
        /// Attempts made under the retry policy
        attempts: u32,
    },
}

/// One candidate's failure within a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    /// Provider id
    pub provider: String,
    /// Failure reason
    pub reason: FailureReason,
}

impl ProviderFailure {
    /// Create a failure record
    #[must_use]
    pub fn new(provider: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            provider: provider.into(),
            reason,
        }
    }

    /// Whether the provider was actually contacted
    #[must_use]
    pub fn reached_provider(&self) -> bool {
        matches!(self.reason, FailureReason::Provider { .. })
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FailureReason::CircuitOpen { retry_after_ms } => write!(
                f,
                "{}: circuit open (retry after {}ms)",
                self.provider, retry_after_ms
            ),
            FailureReason::Provider { error, attempts } => write!(
                f,
                "{}: {} after {} attempt(s): {}",
                self.provider, error.kind, attempts, error.message
            ),
        }
    }
}

/// Result of a successful turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantReply {
    /// Conversation the turn was appended to
    pub conversation_id: Uuid,
    /// The persisted assistant message
    pub message: StoredMessage,
    /// Provider that answered
    pub provider: String,
    /// Attempts made against the answering provider
    pub attempts: u32,
    /// Candidates that failed before the answering one
    pub skipped: Vec<ProviderFailure>,
}

impl AssistantReply {
    /// Whether a lower-priority provider answered
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// Reply text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.message.content
    }
}
