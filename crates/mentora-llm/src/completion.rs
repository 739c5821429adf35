//! Completion request and response types
//!
//! Providers receive the turn as `{system_prompt, history, user_message}` and
//! answer with `{text, usage, latency_ms}`. Wire-format translation is each
//! adapter's job.

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Create usage from prompt and completion counts
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Completion request for one chat turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    /// Model override (empty = provider default)
    pub model: String,
    /// System prompt assembled for this turn
    pub system_prompt: String,
    /// Prior conversation turns, oldest first
    pub history: Vec<Message>,
    /// The new user message
    pub user_message: String,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new completion request for a user message
    #[must_use]
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ..Default::default()
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the conversation history
    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Flatten history plus the new user message into one ordered list
    #[must_use]
    pub fn conversation(&self) -> Vec<Message> {
        let mut messages = self.history.clone();
        messages.push(Message::user(self.user_message.clone()));
        messages
    }
}

/// Completion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Token usage
    pub usage: TokenUsage,
    /// Wall-clock time of the provider call in milliseconds
    pub latency_ms: u64,
    /// Model that produced the answer
    pub model: String,
    /// Finish reason reported by the provider
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageRole;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("Explain photosynthesis.")
            .with_system_prompt("You are a tutor")
            .with_history(vec![Message::user("hi"), Message::assistant("hello")])
            .with_model("gemini-1.5-pro")
            .with_max_tokens(512)
            .with_temperature(0.4);

        assert_eq!(request.system_prompt, "You are a tutor");
        assert_eq!(request.history.len(), 2);
        assert_eq!(request.model, "gemini-1.5-pro");
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.temperature, Some(0.4));
    }

    #[test]
    fn test_conversation_appends_user_message() {
        let request = CompletionRequest::new("second")
            .with_history(vec![Message::user("first"), Message::assistant("reply")]);

        let conversation = request.conversation();
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[2].role, MessageRole::User);
        assert_eq!(conversation[2].content, "second");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(120, 80);
        assert_eq!(usage.total_tokens, 200);
    }
}
