//! Interaction Brokers
//!
//! Mid-flight control signals: the executor suspends on a oneshot when the
//! model asks the user a question or wants to run a guarded tool, and the
//! host resolves the wait by opaque id. Dropping a pending sender wakes the
//! waiter with a cancellation. Lock scopes never cross an await.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// Brokers outstanding human-input and tool-permission waits.
#[derive(Default)]
pub struct InteractionBroker {
    /// request_id -> answer channel
    pending_inputs: Mutex<HashMap<String, oneshot::Sender<String>>>,
    /// operation_id -> approval channel
    pending_permissions: Mutex<HashMap<String, oneshot::Sender<bool>>>,
}

impl InteractionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a human-input wait. The caller emits the request id to the
    /// observer and then awaits the receiver.
    pub fn open_input(&self) -> (String, oneshot::Receiver<String>) {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending_inputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request_id.clone(), tx);
        (request_id, rx)
    }

    /// Deliver the user's answer. Returns false when the id is unknown or
    /// the waiter already went away.
    pub fn resolve_input(&self, request_id: &str, answer: impl Into<String>) -> bool {
        let sender = self
            .pending_inputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(request_id);
        match sender {
            Some(tx) => tx.send(answer.into()).is_ok(),
            None => {
                debug!(request_id, "input resolution for unknown request");
                false
            }
        }
    }

    /// Drop a human-input wait without answering it.
    pub fn discard_input(&self, request_id: &str) {
        self.pending_inputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(request_id);
    }

    /// Register a tool-permission wait.
    pub fn open_permission(&self) -> (String, oneshot::Receiver<bool>) {
        let operation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending_permissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(operation_id.clone(), tx);
        (operation_id, rx)
    }

    /// Deliver the user's approval or denial.
    pub fn resolve_permission(&self, operation_id: &str, allowed: bool) -> bool {
        let sender = self
            .pending_permissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(operation_id);
        match sender {
            Some(tx) => tx.send(allowed).is_ok(),
            None => {
                debug!(operation_id, "permission resolution for unknown operation");
                false
            }
        }
    }

    /// Drop a tool-permission wait without answering it.
    pub fn discard_permission(&self, operation_id: &str) {
        self.pending_permissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(operation_id);
    }

    /// Abandon every outstanding wait. Dropped senders wake their waiters
    /// with a receive error, which callers treat as cancellation.
    pub fn abandon_all(&self) {
        self.pending_inputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.pending_permissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.pending_inputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
            + self
                .pending_permissions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .len()
    }
}
