//! Persona and context assembly
//!
//! Builds the system prompt for a turn from the user's [`AgentProfile`],
//! session hints, and a bounded window of recent turns. Pure and
//! deterministic: the same inputs always produce the same prompt.

use crate::model::{AgentProfile, SessionHints, StoredMessage};
use mentora_llm::{Message, MessageRole};

/// Default number of past turns sent with a turn
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// System prompt plus the history that accompanies it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnContext {
    /// Assembled system prompt
    pub system_prompt: String,
    /// Recent conversation turns, oldest first
    pub history: Vec<Message>,
}

/// Assembles per-turn context
#[derive(Debug, Clone)]
pub struct PersonaBuilder {
    history_window: usize,
}

impl Default for PersonaBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl PersonaBuilder {
    /// Create a builder keeping at most `history_window` recent turns
    #[must_use]
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    /// Configured history window, in turns
    #[must_use]
    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Number of stored messages to load so the window can be filled
    #[must_use]
    pub fn message_budget(&self) -> usize {
        self.history_window.saturating_mul(2)
    }

    /// Build the context for one turn
    ///
    /// Without a profile the default persona is used. `history` must be
    /// ordered oldest first; only the most recent `history_window` turns
    /// are kept. A turn starts at a user message, so the history sent to a
    /// provider never opens with an assistant reply.
    #[must_use]
    pub fn build(
        &self,
        profile: Option<&AgentProfile>,
        history: &[StoredMessage],
        hints: &SessionHints,
    ) -> TurnContext {
        let system_prompt = match profile {
            Some(profile) => self.system_prompt(profile, hints),
            None => self.system_prompt(&AgentProfile::default_for(""), hints),
        };
        TurnContext {
            system_prompt,
            history: self.window(history),
        }
    }

    /// Render the system prompt
    #[must_use]
    pub fn system_prompt(&self, profile: &AgentProfile, hints: &SessionHints) -> String {
        let mut sections = Vec::new();

        sections.push(format!(
            "You are {}, an AI tutor on a school learning platform.",
            profile.agent_name.trim()
        ));

        let persona = profile.persona.trim();
        if !persona.is_empty() {
            sections.push(persona.to_string());
        }

        sections.push(format!(
            "Always respond in {}.",
            language_name(&profile.language)
        ));
        sections.push(profile.style.instruction().to_string());

        if !profile.expertise.is_empty() {
            let tags: Vec<&str> = profile.expertise.iter().map(String::as_str).collect();
            sections.push(format!("Focus areas: {}.", tags.join(", ")));
        }

        if let Some(course) = non_empty(hints.course.as_deref()) {
            sections.push(format!("The student is currently working in the course \"{course}\"."));
        }
        if let Some(notes) = non_empty(hints.notes.as_deref()) {
            sections.push(format!("Session notes: {notes}"));
        }

        if !profile.quick_actions.is_empty() {
            let mut actions = String::from("The student has these quick actions:");
            for action in &profile.quick_actions {
                actions.push_str(&format!("\n- {}: {}", action.label, action.prompt));
            }
            sections.push(actions);
        }

        sections.join("\n\n")
    }

    fn window(&self, history: &[StoredMessage]) -> Vec<Message> {
        let messages: Vec<&StoredMessage> = history
            .iter()
            .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
            .collect();
        let turn_starts: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == MessageRole::User)
            .map(|(i, _)| i)
            .collect();

        let skip = turn_starts.len().saturating_sub(self.history_window);
        match turn_starts.get(skip) {
            Some(&start) => messages[start..].iter().map(|m| m.to_message()).collect(),
            None => Vec::new(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// English name for common ISO 639-1 codes; unknown codes pass through
fn language_name(code: &str) -> String {
    let code = code.trim();
    let name = match code.to_ascii_lowercase().as_str() {
        "" | "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "pt" => "Portuguese",
        "it" => "Italian",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "sw" => "Swahili",
        _ => return format!("the language with code \"{code}\""),
    };
    name.to_string()
}
