//! Domain model
//!
//! Conversations, stored messages, per-user agent profiles and failed-turn
//! markers. Storage backends persist these; the orchestrator mutates them.

use crate::orchestrator::ProviderFailure;
use chrono::{DateTime, Utc};
use mentora_llm::{Message, MessageRole, TokenUsage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default agent name when a user has no profile
pub const DEFAULT_AGENT_NAME: &str = "AI Tutor";

/// Default preferred language
pub const DEFAULT_LANGUAGE: &str = "en";

// ============================================================================
// Conversation
// ============================================================================

/// Conversation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Accepting new turns
    Active,
    /// Soft-deleted; kept for history
    Archived,
}

impl ConversationStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown conversation status: {other}")),
        }
    }
}

/// A tutoring conversation owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id
    pub id: Uuid,
    /// Owning user
    pub user_id: String,
    /// Last provider that produced an assistant message
    pub provider: Option<String>,
    /// Lifecycle status
    pub status: ConversationStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Start a new, empty conversation
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            provider: None,
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the conversation is archived
    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.status == ConversationStatus::Archived
    }
}

/// A persisted message; immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Message id
    pub id: Uuid,
    /// Owning conversation
    pub conversation_id: Uuid,
    /// Sender role
    pub role: MessageRole,
    /// Text content
    pub content: String,
    /// Provider that produced it (assistant messages only)
    pub provider: Option<String>,
    /// Model that produced it (assistant messages only)
    pub model: Option<String>,
    /// Token usage
    pub usage: TokenUsage,
    /// Estimated cost in USD
    pub cost_usd: f64,
    /// Provider latency in milliseconds
    pub latency_ms: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// A user message
    #[must_use]
    pub fn user(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::User,
            content: content.into(),
            provider: None,
            model: None,
            usage: TokenUsage::default(),
            cost_usd: 0.0,
            latency_ms: 0,
            created_at: Utc::now(),
        }
    }

    /// An assistant message produced by `provider`
    #[must_use]
    pub fn assistant(
        conversation_id: Uuid,
        provider: impl Into<String>,
        response: &mentora_llm::CompletionResponse,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::Assistant,
            content: response.text.clone(),
            provider: Some(provider.into()),
            model: Some(response.model.clone()),
            usage: response.usage,
            cost_usd: mentora_llm::estimate_cost_usd(&response.model, &response.usage),
            latency_ms: response.latency_ms,
            created_at: Utc::now(),
        }
    }

    /// Role-tagged form for provider history
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }
}

// ============================================================================
// Agent profile
// ============================================================================

/// Tone and depth of the tutor's answers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    /// Short, to the point
    Concise,
    /// Thorough and step by step
    Detailed,
    /// Warm and informal
    #[default]
    Conversational,
    /// Formal and precise
    Academic,
}

impl ResponseStyle {
    /// Every style, in display order
    pub const ALL: [Self; 4] = [
        Self::Concise,
        Self::Detailed,
        Self::Conversational,
        Self::Academic,
    ];

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concise => "concise",
            Self::Detailed => "detailed",
            Self::Conversational => "conversational",
            Self::Academic => "academic",
        }
    }

    /// The fixed system-prompt instruction for this style
    #[must_use]
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Concise => {
                "Keep answers concise: a few sentences or a short list, without filler."
            }
            Self::Detailed => {
                "Give thorough, step-by-step explanations and include a worked example when it helps."
            }
            Self::Conversational => {
                "Use a warm, conversational tone and check the student's understanding as you go."
            }
            Self::Academic => {
                "Use precise, formal academic language and name the underlying principles."
            }
        }
    }
}

impl fmt::Display for ResponseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown response style: {s} (expected concise, detailed, conversational or academic)")
            })
    }
}

/// A saved prompt shortcut
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    /// Button label
    pub label: String,
    /// Prompt sent when used
    pub prompt: String,
}

impl QuickAction {
    /// Create a quick action
    #[must_use]
    pub fn new(label: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            prompt: prompt.into(),
        }
    }
}

/// Per-user tutor customization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Owning user (one profile per user)
    pub user_id: String,
    /// Name the tutor introduces itself with
    pub agent_name: String,
    /// Free-form persona description
    pub persona: String,
    /// Preferred answer language (ISO 639-1 code)
    pub language: String,
    /// Subjects to focus on
    pub expertise: BTreeSet<String>,
    /// Answer style
    pub style: ResponseStyle,
    /// Ordered prompt shortcuts
    pub quick_actions: Vec<QuickAction>,
    /// Last edit time
    pub updated_at: DateTime<Utc>,
}

impl AgentProfile {
    /// The profile synthesized for a user who never customized one
    #[must_use]
    pub fn default_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            persona: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            expertise: BTreeSet::new(),
            style: ResponseStyle::default(),
            quick_actions: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Set the agent name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    /// Set the persona text
    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Set the preferred language
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the response style
    #[must_use]
    pub fn with_style(mut self, style: ResponseStyle) -> Self {
        self.style = style;
        self
    }

    /// Add an expertise tag
    #[must_use]
    pub fn with_expertise(mut self, tag: impl Into<String>) -> Self {
        self.expertise.insert(tag.into());
        self
    }

    /// Append a quick action
    #[must_use]
    pub fn with_quick_action(mut self, action: QuickAction) -> Self {
        self.quick_actions.push(action);
        self
    }
}

// ============================================================================
// Turn inputs and failure markers
// ============================================================================

/// Session-level context supplied with a turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHints {
    /// Course the student is currently working in
    pub course: Option<String>,
    /// Free-form notes for this session
    pub notes: Option<String>,
}

impl SessionHints {
    /// Set the course context
    #[must_use]
    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }

    /// Set session notes
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Marker for a turn that no provider could answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnFailure {
    /// Marker id
    pub id: Uuid,
    /// Conversation the turn belonged to
    pub conversation_id: Uuid,
    /// The unanswered user message
    pub user_message: String,
    /// Why each candidate failed
    pub reasons: Vec<ProviderFailure>,
    /// When the turn failed
    pub created_at: DateTime<Utc>,
}

impl TurnFailure {
    /// Create a marker
    #[must_use]
    pub fn new(
        conversation_id: Uuid,
        user_message: impl Into<String>,
        reasons: Vec<ProviderFailure>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            user_message: user_message.into(),
            reasons,
            created_at: Utc::now(),
        }
    }
}
