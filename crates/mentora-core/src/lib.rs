//! Mentora Core - Turn Orchestration
//!
//! This crate routes AI tutor chat turns across LLM providers, including:
//! - Orchestrator: candidate ordering, fallback and persistence of a turn
//! - Health: one circuit breaker per provider, injected rather than global
//! - Utils: retry with exponential backoff, circuit breaker, counters
//! - Persona: system prompt assembly from the user's agent profile
//! - Store: conversation, message, profile and failure persistence
//! - Model: the persisted domain types

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod health;
pub mod model;
pub mod orchestrator;
pub mod persona;
pub mod store;
pub mod utils;

pub use error::{format_error_for_cli, Error, Result, UserFriendlyError, UNAVAILABLE_MESSAGE};
pub use health::HealthRegistry;
pub use model::{
    AgentProfile, Conversation, ConversationStatus, QuickAction, ResponseStyle, SessionHints,
    StoredMessage, TurnFailure,
};
pub use orchestrator::{
    AssistantReply, FailureReason, OrchestratorConfig, ProviderFailure, ProviderStatus,
    TurnInput, TurnOrchestrator,
};
pub use persona::{PersonaBuilder, TurnContext};
pub use store::{ConversationStore, MemoryStore, SqliteStore};
pub use utils::{
    BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitOpenError, CircuitState,
    ProviderMetricsSnapshot, RetryConfig,
};
