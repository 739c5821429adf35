//! In-memory conversation store
//!
//! Data is lost when the process exits. Intended for tests and local
//! development.

use super::ConversationStore;
use crate::error::{Error, Result};
use crate::model::{AgentProfile, Conversation, ConversationStatus, StoredMessage, TurnFailure};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Vec<StoredMessage>>,
    failures: HashMap<Uuid, Vec<TurnFailure>>,
    profiles: HashMap<String, AgentProfile>,
}

/// In-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total messages across all conversations
    pub async fn message_count(&self) -> usize {
        self.inner.read().await.messages.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.conversations.contains_key(&conversation.id) {
            return Err(Error::Storage(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        debug!(conversation_id = %conversation.id, "Conversation created in memory");
        Ok(())
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.inner.read().await.conversations.get(&id).cloned())
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        include_archived: bool,
    ) -> Result<Vec<Conversation>> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.user_id == user_id && (include_archived || !c.is_archived()))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn archive_conversation(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.conversations.get_mut(&id) {
            Some(conversation) => {
                conversation.status = ConversationStatus::Archived;
                conversation.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let inner = self.inner.read().await;
        let messages = inner
            .messages
            .get(&conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_turn(&self, user: &StoredMessage, assistant: &StoredMessage) -> Result<()> {
        if user.conversation_id != assistant.conversation_id {
            return Err(Error::InvalidInput(
                "turn messages belong to different conversations".to_string(),
            ));
        }
        let conversation_id = user.conversation_id;

        let mut inner = self.inner.write().await;
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;
        conversation.provider = assistant.provider.clone();
        conversation.updated_at = Utc::now();

        let messages = inner.messages.entry(conversation_id).or_default();
        messages.push(user.clone());
        messages.push(assistant.clone());
        debug!(conversation_id = %conversation_id, "Turn appended in memory");
        Ok(())
    }

    async fn record_failure(&self, failure: &TurnFailure) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .failures
            .entry(failure.conversation_id)
            .or_default()
            .push(failure.clone());
        Ok(())
    }

    async fn list_failures(&self, conversation_id: Uuid) -> Result<Vec<TurnFailure>> {
        let inner = self.inner.read().await;
        Ok(inner
            .failures
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<AgentProfile>> {
        Ok(self.inner.read().await.profiles.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &AgentProfile) -> Result<()> {
        self.inner
            .write()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }
}
