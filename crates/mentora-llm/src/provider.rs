//! LLM Provider trait definition
//!
//! This module defines the core trait that all provider adapters implement.

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::Result;

/// Trait for LLM providers
///
/// One call is one network request. Implementations must not retry; the
/// orchestrator's retry policy and circuit breaker account for every attempt.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier used for routing, breakers and persistence
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Complete one chat turn
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
