//! Scripted LLM provider for tests and local development
//!
//! Replies are queued ahead of time; once the queue drains the provider
//! falls back to a fixed outcome. Every call is recorded.

use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::{ProviderError, ProviderErrorKind, Result};
use crate::provider::LlmProvider;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Model name reported by scripted replies
pub const MOCK_MODEL: &str = "mock-model";

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Answer with this text
    Reply(String),
    /// Fail with this error kind
    Fail(ProviderErrorKind),
    /// Sleep for the duration, then answer
    Stall(Duration, String),
}

/// A recorded call
#[derive(Debug, Clone)]
pub struct MockCall {
    /// The request the provider received
    pub request: CompletionRequest,
}

/// A provider that plays back queued outcomes
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Scripted>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl ScriptedProvider {
    /// Create a provider that replies "mock response" once its script runs out
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Scripted::Reply("mock response".to_string())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a provider whose every call fails with `kind`
    #[must_use]
    pub fn failing(name: impl Into<String>, kind: ProviderErrorKind) -> Self {
        let provider = Self::new(name);
        provider.set_fallback(Scripted::Fail(kind));
        provider
    }

    /// Queue an outcome
    pub fn push(&self, outcome: Scripted) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
        self
    }

    /// Queue a successful reply
    pub fn push_reply(&self, text: impl Into<String>) -> &Self {
        self.push(Scripted::Reply(text.into()))
    }

    /// Queue a failure
    pub fn push_error(&self, kind: ProviderErrorKind) -> &Self {
        self.push(Scripted::Fail(kind))
    }

    /// Queue a call that does not answer for a long time
    pub fn push_stall(&self, duration: Duration) -> &Self {
        self.push(Scripted::Stall(duration, "late response".to_string()))
    }

    /// Replace the outcome used once the queue is empty
    pub fn set_fallback(&self, outcome: Scripted) {
        *self.fallback.lock().unwrap_or_else(|e| e.into_inner()) = outcome;
    }

    /// Number of calls received
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// All recorded calls, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The most recent request, if any
    #[must_use]
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .map(|call| call.request.clone())
    }

    fn next_outcome(&self) -> Scripted {
        let queued = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        queued.unwrap_or_else(|| {
            self.fallback
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        })
    }

    fn reply(&self, request: &CompletionRequest, text: String, latency_ms: u64) -> CompletionResponse {
        // Rough token estimate: four bytes per token
        let prompt_bytes = request.system_prompt.len()
            + request.user_message.len()
            + request.history.iter().map(|m| m.content.len()).sum::<usize>();
        let usage = TokenUsage::new(
            u32::try_from(prompt_bytes / 4).unwrap_or(u32::MAX),
            u32::try_from(text.len() / 4).unwrap_or(u32::MAX),
        );
        CompletionResponse {
            text,
            usage,
            latency_ms,
            model: if request.model.is_empty() {
                MOCK_MODEL.to_string()
            } else {
                request.model.clone()
            },
            finish_reason: Some("stop".to_string()),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        MOCK_MODEL
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockCall {
                request: request.clone(),
            });

        match self.next_outcome() {
            Scripted::Reply(text) => Ok(self.reply(&request, text, 0)),
            Scripted::Fail(kind) => Err(ProviderError::new(
                self.name.clone(),
                kind,
                format!("scripted {kind} failure"),
            )),
            Scripted::Stall(duration, text) => {
                tokio::time::sleep(duration).await;
                let latency_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                Ok(self.reply(&request, text, latency_ms))
            }
        }
    }
}
