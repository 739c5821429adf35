//! SQLite conversation storage backend
//!
//! Provides persistent storage using SQLite - the default backend for Mentora.
//!
//! # Features
//!
//! - No external services (embedded database)
//! - Schema created on open
//! - WAL journal mode
//! - Turns are written in a single transaction
//!
//! # Usage
//!
//! ```no_run
//! use mentora_core::store::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Default location: ~/.mentora/mentora.db
//! let store = SqliteStore::new_default().await?;
//!
//! // Or specify a custom path
//! let store = SqliteStore::new("/path/to/mentora.db").await?;
//! # Ok(())
//! # }
//! ```

use super::ConversationStore;
use crate::error::{Error, Result};
use crate::model::{AgentProfile, Conversation, ConversationStatus, StoredMessage, TurnFailure};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use mentora_llm::{MessageRole, TokenUsage};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

type ConversationRow = (String, String, Option<String>, String, String, String);

type MessageRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    i64,
    i64,
    i64,
    f64,
    i64,
    String,
);

const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, provider, model, \
     prompt_tokens, completion_tokens, total_tokens, cost_usd, latency_ms, created_at";

/// SQLite conversation store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store at the specified path
    ///
    /// # Errors
    ///
    /// Returns error if database creation or schema setup fails.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| Error::Storage(format!("Invalid SQLite path: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Storage(format!("Failed to connect to SQLite: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;

        info!(path = %path.display(), "SQLite conversation store initialized");
        Ok(store)
    }

    /// Create a store at the default location (~/.mentora/mentora.db)
    pub async fn new_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::new(&path).await
    }

    /// Get the default database path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Storage("Could not determine home directory".to_string()))?;
        Ok(home.join(".mentora").join("mentora.db"))
    }

    async fn init_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_conversations_user
                ON conversations(user_id, updated_at)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                provider TEXT,
                model TEXT,
                prompt_tokens INTEGER NOT NULL DEFAULT 0,
                completion_tokens INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                cost_usd REAL NOT NULL DEFAULT 0,
                latency_ms INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, seq)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS turn_failures (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                user_message TEXT NOT NULL,
                reasons TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS agent_profiles (
                user_id TEXT PRIMARY KEY,
                profile_data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;
        }

        debug!("SQLite conversation schema initialized");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("Health check failed: {}", e)))?;
        Ok(true)
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Invalid timestamp '{}': {}", value, e)))
}

fn parse_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Storage(format!("Invalid id '{}': {}", value, e)))
}

fn conversation_from_row(row: ConversationRow) -> Result<Conversation> {
    let (id, user_id, provider, status, created_at, updated_at) = row;
    Ok(Conversation {
        id: parse_id(&id)?,
        user_id,
        provider,
        status: ConversationStatus::from_str(&status).map_err(Error::Storage)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn message_from_row(row: MessageRow) -> Result<StoredMessage> {
    let (
        id,
        conversation_id,
        role,
        content,
        provider,
        model,
        prompt_tokens,
        completion_tokens,
        total_tokens,
        cost_usd,
        latency_ms,
        created_at,
    ) = row;
    Ok(StoredMessage {
        id: parse_id(&id)?,
        conversation_id: parse_id(&conversation_id)?,
        role: MessageRole::from_str(&role).map_err(Error::Storage)?,
        content,
        provider,
        model,
        usage: TokenUsage {
            prompt_tokens: prompt_tokens as u32,
            completion_tokens: completion_tokens as u32,
            total_tokens: total_tokens as u32,
        },
        cost_usd,
        latency_ms: latency_ms as u64,
        created_at: parse_timestamp(&created_at)?,
    })
}

async fn insert_message<'c, E>(executor: E, message: &StoredMessage) -> Result<()>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, role, content, provider, model,
            prompt_tokens, completion_tokens, total_tokens, cost_usd, latency_ms, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(message.id.to_string())
    .bind(message.conversation_id.to_string())
    .bind(message.role.as_str())
    .bind(&message.content)
    .bind(&message.provider)
    .bind(&message.model)
    .bind(i64::from(message.usage.prompt_tokens))
    .bind(i64::from(message.usage.completion_tokens))
    .bind(i64::from(message.usage.total_tokens))
    .bind(message.cost_usd)
    .bind(message.latency_ms as i64)
    .bind(timestamp(&message.created_at))
    .execute(executor)
    .await
    .map_err(|e| Error::Storage(format!("Failed to insert message: {}", e)))?;
    Ok(())
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, provider, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.user_id)
        .bind(&conversation.provider)
        .bind(conversation.status.as_str())
        .bind(timestamp(&conversation.created_at))
        .bind(timestamp(&conversation.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to create conversation: {}", e)))?;

        debug!(conversation_id = %conversation.id, "Conversation created in SQLite");
        Ok(())
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            "SELECT id, user_id, provider, status, created_at, updated_at \
             FROM conversations WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to get conversation: {}", e)))?;

        row.map(conversation_from_row).transpose()
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        include_archived: bool,
    ) -> Result<Vec<Conversation>> {
        let rows: Vec<ConversationRow> = sqlx::query_as(
            "SELECT id, user_id, provider, status, created_at, updated_at \
             FROM conversations \
             WHERE user_id = ? AND (? OR status = 'active') \
             ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .bind(include_archived)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to list conversations: {}", e)))?;

        rows.into_iter().map(conversation_from_row).collect()
    }

    async fn archive_conversation(&self, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("UPDATE conversations SET status = 'archived', updated_at = ? WHERE id = ?")
                .bind(timestamp(&Utc::now()))
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to archive conversation: {}", e)))?;

        let archived = result.rows_affected() > 0;
        debug!(conversation_id = %id, archived = archived, "Conversation archived");
        Ok(archived)
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM ( \
                 SELECT seq, {MESSAGE_COLUMNS} FROM messages \
                 WHERE conversation_id = ? ORDER BY seq DESC LIMIT ? \
             ) ORDER BY seq ASC"
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&query)
            .bind(conversation_id.to_string())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("Failed to load recent messages: {}", e)))?;

        rows.into_iter().map(message_from_row).collect()
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>> {
        let query =
            format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ? ORDER BY seq");
        let rows: Vec<MessageRow> = sqlx::query_as(&query)
            .bind(conversation_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("Failed to list messages: {}", e)))?;

        rows.into_iter().map(message_from_row).collect()
    }

    async fn append_turn(&self, user: &StoredMessage, assistant: &StoredMessage) -> Result<()> {
        if user.conversation_id != assistant.conversation_id {
            return Err(Error::InvalidInput(
                "turn messages belong to different conversations".to_string(),
            ));
        }
        let conversation_id = user.conversation_id;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;

        let updated =
            sqlx::query("UPDATE conversations SET provider = ?, updated_at = ? WHERE id = ?")
                .bind(&assistant.provider)
                .bind(timestamp(&Utc::now()))
                .bind(conversation_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Storage(format!("Failed to update conversation: {}", e)))?;
        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(format!("conversation {conversation_id}")));
        }

        insert_message(&mut *tx, user).await?;
        insert_message(&mut *tx, assistant).await?;

        tx.commit()
            .await
            .map_err(|e| Error::Storage(format!("Failed to commit turn: {}", e)))?;

        debug!(
            conversation_id = %conversation_id,
            provider = assistant.provider.as_deref().unwrap_or_default(),
            "Turn saved to SQLite"
        );
        Ok(())
    }

    async fn record_failure(&self, failure: &TurnFailure) -> Result<()> {
        let reasons = serde_json::to_string(&failure.reasons)
            .map_err(|e| Error::Storage(format!("Failed to serialize failure reasons: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO turn_failures (id, conversation_id, user_message, reasons, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(failure.id.to_string())
        .bind(failure.conversation_id.to_string())
        .bind(&failure.user_message)
        .bind(&reasons)
        .bind(timestamp(&failure.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to record turn failure: {}", e)))?;

        debug!(conversation_id = %failure.conversation_id, "Turn failure recorded");
        Ok(())
    }

    async fn list_failures(&self, conversation_id: Uuid) -> Result<Vec<TurnFailure>> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, conversation_id, user_message, reasons, created_at \
             FROM turn_failures WHERE conversation_id = ? ORDER BY created_at",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to list turn failures: {}", e)))?;

        rows.into_iter()
            .map(|(id, conversation_id, user_message, reasons, created_at)| {
                Ok(TurnFailure {
                    id: parse_id(&id)?,
                    conversation_id: parse_id(&conversation_id)?,
                    user_message,
                    reasons: serde_json::from_str(&reasons).map_err(|e| {
                        Error::Storage(format!("Failed to deserialize failure reasons: {}", e))
                    })?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<AgentProfile>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT profile_data FROM agent_profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to get profile: {}", e)))?;

        match row {
            Some((data,)) => {
                let profile: AgentProfile = serde_json::from_str(&data).map_err(|e| {
                    Error::Storage(format!("Failed to deserialize profile: {}", e))
                })?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    async fn upsert_profile(&self, profile: &AgentProfile) -> Result<()> {
        let data = serde_json::to_string(profile)
            .map_err(|e| Error::Storage(format!("Failed to serialize profile: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO agent_profiles (user_id, profile_data, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                profile_data = excluded.profile_data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.user_id)
        .bind(&data)
        .bind(timestamp(&profile.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to save profile: {}", e)))?;

        debug!(user_id = %profile.user_id, "Profile saved to SQLite");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{FailureReason, ProviderFailure};
    use crate::model::{QuickAction, ResponseStyle};
    use mentora_llm::CompletionResponse;
    use tempfile::TempDir;

    async fn create_test_store() -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_mentora.db");
        let store = SqliteStore::new(&db_path).await.unwrap();
        (store, temp_dir)
    }

    fn reply(text: &str) -> CompletionResponse {
        CompletionResponse {
            text: text.to_string(),
            usage: TokenUsage::new(120, 40),
            latency_ms: 350,
            model: "claude-3-5-sonnet-20241022".to_string(),
            finish_reason: Some("end_turn".to_string()),
        }
    }

    #[tokio::test]
    async fn test_conversation_roundtrip() {
        let (store, _temp) = create_test_store().await;

        let conversation = Conversation::new("student-1");
        store.create_conversation(&conversation).await.unwrap();

        let loaded = store.get_conversation(conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, conversation.id);
        assert_eq!(loaded.user_id, "student-1");
        assert_eq!(loaded.status, ConversationStatus::Active);
        assert!(loaded.provider.is_none());

        assert!(store.get_conversation(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_turn_persists_both_messages() {
        let (store, _temp) = create_test_store().await;
        let conversation = Conversation::new("student-1");
        store.create_conversation(&conversation).await.unwrap();

        let user = StoredMessage::user(conversation.id, "Explain photosynthesis.");
        let assistant = StoredMessage::assistant(conversation.id, "anthropic", &reply("Plants..."));
        store.append_turn(&user, &assistant).await.unwrap();

        let messages = store.list_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].provider.as_deref(), Some("anthropic"));
        assert_eq!(messages[1].usage.total_tokens, 160);
        assert_eq!(messages[1].latency_ms, 350);
        assert!(messages[1].cost_usd > 0.0);

        let loaded = store.get_conversation(conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.provider.as_deref(), Some("anthropic"));
    }

    #[tokio::test]
    async fn test_append_turn_unknown_conversation_writes_nothing() {
        let (store, _temp) = create_test_store().await;
        let id = Uuid::new_v4();

        let result = store
            .append_turn(
                &StoredMessage::user(id, "hi"),
                &StoredMessage::assistant(id, "gemini", &reply("hello")),
            )
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(store.list_messages(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_messages_oldest_first() {
        let (store, _temp) = create_test_store().await;
        let conversation = Conversation::new("student-1");
        store.create_conversation(&conversation).await.unwrap();

        for i in 0..3 {
            store
                .append_turn(
                    &StoredMessage::user(conversation.id, format!("q{i}")),
                    &StoredMessage::assistant(conversation.id, "openai", &reply(&format!("a{i}"))),
                )
                .await
                .unwrap();
        }

        let recent = store.recent_messages(conversation.id, 4).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
    }

    #[tokio::test]
    async fn test_archive_and_list() {
        let (store, _temp) = create_test_store().await;
        let first = Conversation::new("student-1");
        let second = Conversation::new("student-1");
        store.create_conversation(&first).await.unwrap();
        store.create_conversation(&second).await.unwrap();

        assert!(store.archive_conversation(first.id).await.unwrap());
        assert!(!store.archive_conversation(Uuid::new_v4()).await.unwrap());

        let active = store.list_conversations("student-1", false).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);

        let all = store.list_conversations("student-1", true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(store.list_conversations("nobody", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_markers() {
        let (store, _temp) = create_test_store().await;
        let conversation = Conversation::new("student-1");
        store.create_conversation(&conversation).await.unwrap();

        let failure = TurnFailure::new(
            conversation.id,
            "Explain osmosis.",
            vec![ProviderFailure::new(
                "gemini",
                FailureReason::CircuitOpen {
                    retry_after_ms: 12_000,
                },
            )],
        );
        store.record_failure(&failure).await.unwrap();

        let failures = store.list_failures(conversation.id).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].user_message, "Explain osmosis.");
        assert_eq!(failures[0].reasons, failure.reasons);
        assert!(store.list_messages(conversation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_upsert() {
        let (store, _temp) = create_test_store().await;
        assert!(store.get_profile("student-1").await.unwrap().is_none());

        let profile = AgentProfile::default_for("student-1")
            .with_name("Ada")
            .with_style(ResponseStyle::Academic)
            .with_expertise("physics")
            .with_quick_action(QuickAction::new("Summarize", "Summarize the last answer."));
        store.upsert_profile(&profile).await.unwrap();

        let loaded = store.get_profile("student-1").await.unwrap().unwrap();
        assert_eq!(loaded.agent_name, "Ada");
        assert_eq!(loaded.style, ResponseStyle::Academic);
        assert!(loaded.expertise.contains("physics"));
        assert_eq!(loaded.quick_actions.len(), 1);

        store
            .upsert_profile(&profile.clone().with_language("es"))
            .await
            .unwrap();
        let loaded = store.get_profile("student-1").await.unwrap().unwrap();
        assert_eq!(loaded.language, "es");
    }

    #[tokio::test]
    async fn test_health_check() {
        let (store, _temp) = create_test_store().await;
        assert!(store.health_check().await.unwrap());
    }
}
