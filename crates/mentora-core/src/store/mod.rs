//! Conversation storage
//!
//! The [`ConversationStore`] trait abstracts persistence of conversations,
//! messages, agent profiles and failed-turn markers.
//!
//! # Backends
//!
//! - `SqliteStore`: persistent, the default for the CLI
//! - `MemoryStore`: in-process, for tests and local development

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::model::{AgentProfile, Conversation, StoredMessage, TurnFailure};
use async_trait::async_trait;
use uuid::Uuid;

/// Storage backend for conversations and profiles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persist a new conversation
    async fn create_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Get a conversation by id
    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>>;

    /// List a user's conversations, most recently updated first
    async fn list_conversations(
        &self,
        user_id: &str,
        include_archived: bool,
    ) -> Result<Vec<Conversation>>;

    /// Archive a conversation; returns false if it does not exist
    async fn archive_conversation(&self, id: Uuid) -> Result<bool>;

    /// The most recent `limit` messages, oldest first
    async fn recent_messages(&self, conversation_id: Uuid, limit: usize)
        -> Result<Vec<StoredMessage>>;

    /// Every message in a conversation, oldest first
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>>;

    /// Atomically append a user message and the assistant message answering
    /// it, and record the assistant's provider on the conversation
    async fn append_turn(&self, user: &StoredMessage, assistant: &StoredMessage) -> Result<()>;

    /// Record a turn that no provider answered
    async fn record_failure(&self, failure: &TurnFailure) -> Result<()>;

    /// Failed turns of a conversation, oldest first
    async fn list_failures(&self, conversation_id: Uuid) -> Result<Vec<TurnFailure>>;

    /// Get a user's agent profile
    async fn get_profile(&self, user_id: &str) -> Result<Option<AgentProfile>>;

    /// Create or replace a user's agent profile
    async fn upsert_profile(&self, profile: &AgentProfile) -> Result<()>;
}
