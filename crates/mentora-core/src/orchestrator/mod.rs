//! Orchestrator - turn routing across providers
//!
//! Ties together the persona builder, the per-provider circuit breakers,
//! the retry policy and the conversation store.
//!
//! # Module Structure
//!
//! - `types`: Turn results and per-provider failure reasons
//! - `config`: Configuration types (OrchestratorConfig, TurnInput)
//! - `core`: TurnOrchestrator struct, builder and status views
//! - `turn`: The turn loop (submit_turn)

mod config;
mod core;
mod turn;
mod types;


pub use config::{OrchestratorConfig, TurnInput, DEFAULT_PRIORITY};
pub use core::{ProviderStatus, TurnOrchestrator};
pub use types::{AssistantReply, FailureReason, ProviderFailure};
