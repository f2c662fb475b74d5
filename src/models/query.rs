//! Query Models
//!
//! The incoming query shape and its conversation history. A query is
//! immutable after creation except for one appended clarification answer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use switchboard_llm::{ChatMessage, Role};

/// Where a query entered the engine from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOrigin {
    /// The primary user surface
    Primary,
    /// Another service calling on a user's behalf
    SecondaryCaller,
}

impl Default for QueryOrigin {
    fn default() -> Self {
        Self::Primary
    }
}

/// One prior turn of conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn char_len(&self) -> usize {
        self.content.len()
    }

    /// The model-facing shape of this turn.
    pub fn to_chat_message(&self) -> ChatMessage {
        match self.role {
            Role::User => ChatMessage::user(&self.content),
            Role::Assistant => ChatMessage::assistant(&self.content),
        }
    }
}

/// An incoming query plus everything needed to act on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub text: String,
    /// Present when the query belongs to an ongoing conversation
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub attachment_ids: Vec<String>,
    #[serde(default)]
    pub origin: QueryOrigin,
    /// Recent turns, oldest first
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            conversation_id: None,
            attachment_ids: Vec::new(),
            origin: QueryOrigin::Primary,
            history: Vec::new(),
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_attachments(mut self, attachment_ids: Vec<String>) -> Self {
        self.attachment_ids = attachment_ids;
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_origin(mut self, origin: QueryOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Reject malformed queries before they enter the pipeline
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("query id must not be empty".to_string());
        }

        if self.text.trim().is_empty() {
            return Err("query text must not be empty".to_string());
        }

        Ok(())
    }

    /// Append the clarification answer as the newest turn. The only
    /// mutation a query permits after creation.
    pub fn append_turn(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
    }
}
