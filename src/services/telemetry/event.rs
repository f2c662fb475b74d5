//! Raw Telemetry Events
//!
//! Heterogeneously-shaped execution telemetry as emitted by the executor,
//! planner, and routing stages. Raw events never reach a client; the
//! normalizer classifies them into canonical updates or drops them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event namespaces used by the engine's own producers.
pub mod namespaces {
    /// Agent selection and hand-off
    pub const WORKFLOW_ROUTING: &str = "workflow.routing";
    /// Plan generation for the planned strategy
    pub const WORKFLOW_PLANNER: &str = "workflow.planner";
    /// Query start, completion, and failure
    pub const WORKFLOW_LIFECYCLE: &str = "workflow.lifecycle";
    /// Internal bookkeeping, filtered before delivery
    pub const FRAMEWORK_INTERNAL: &str = "framework.internal";

    /// Namespace for one agent's model calls.
    pub fn agent_model(agent_name: &str) -> String {
        format!("agent.{}.model", agent_name)
    }
}

/// One unit of raw execution telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Dotted origin namespace, e.g. `agent.researcher.model`
    pub namespace: String,
    /// Explicit progress-action tag when the producer knows the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Producer-shaped payload; structure varies by source
    #[serde(default)]
    pub payload: Value,
    /// Loose context fields, e.g. the originating agent's display name
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

impl RawEvent {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            action: None,
            payload: Value::Null,
            context: HashMap::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Context field as a string, when present and string-shaped.
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(|v| v.as_str())
    }
}
