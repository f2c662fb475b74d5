//! Message History
//!
//! Read-only access to prior conversation turns. Durable storage lives
//! outside the engine; this trait is the polling seam, plus an in-memory
//! implementation for embedding and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::ConversationTurn;

/// External conversation store, read-only from the engine's perspective.
#[async_trait]
pub trait MessageHistoryRepository: Send + Sync {
    /// Most recent turns for a conversation, oldest first, at most `limit`.
    async fn get_recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, String>;
}

/// Map-backed history store.
#[derive(Default)]
pub struct InMemoryHistory {
    conversations: Mutex<HashMap<String, Vec<ConversationTurn>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, conversation_id: &str, turn: ConversationTurn) {
        self.conversations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(conversation_id.to_string())
            .or_default()
            .push(turn);
    }
}

#[async_trait]
impl MessageHistoryRepository for InMemoryHistory {
    async fn get_recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, String> {
        let conversations = self
            .conversations
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let turns = conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        let skip = turns.len().saturating_sub(limit);
        Ok(turns.into_iter().skip(skip).collect())
    }
}
