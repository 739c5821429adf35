//! Mentora LLM - Provider Adapters
//!
//! This crate provides the provider layer for Mentora's AI tutor:
//! - Provider: the `LlmProvider` trait every backend implements
//! - Completion: normalized request/response types
//! - Error: normalized `ProviderError` with retriable classification
//! - Gemini: Google Gemini (generateContent API)
//! - Anthropic: Claude (Messages API)
//! - OpenAI: GPT-4 family (Chat Completions API)
//! - Grok: xAI Grok (OpenAI-compatible API)
//! - Mock: scripted provider for tests and local development
//! - Cost: per-model pricing for cost estimation
//!
//! Adapters never retry. A single call maps to a single HTTP request so that
//! the caller's retry policy and circuit breaker see every failure.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod completion;
pub mod cost;
pub mod error;
pub mod gemini;
pub mod grok;
pub mod message;
pub mod mock;
mod openai_compat;
pub mod openai;
pub mod provider;
pub mod util;

pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use cost::{estimate_cost_usd, ModelPricing};
pub use error::{ProviderError, ProviderErrorKind, Result};
pub use message::{Message, MessageRole};
pub use mock::{MockCall, Scripted, ScriptedProvider};
pub use provider::LlmProvider;

// Re-export provider types
pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use grok::{GrokConfig, GrokProvider};
pub use openai::{OpenAiConfig, OpenAiProvider};
