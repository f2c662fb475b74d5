//! Pending Clarifications
//!
//! Read-once store of suspended strategies, keyed by conversation id. At
//! most one entry per conversation; a new one replaces the old.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::models::PendingClarification;

#[derive(Default)]
pub struct ClarificationStore {
    pending: Mutex<HashMap<String, PendingClarification>>,
}

impl ClarificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, conversation_id: &str, pending: PendingClarification) {
        debug!(
            conversation_id = %conversation_id,
            strategy = %pending.strategy,
            "clarification suspended"
        );
        let mut map = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(conversation_id.to_string(), pending);
    }

    /// Removes and returns the entry, so a clarification resumes at most once.
    pub fn take(&self, conversation_id: &str) -> Option<PendingClarification> {
        let mut map = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(conversation_id)
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        let map = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        map.contains_key(conversation_id)
    }
}
