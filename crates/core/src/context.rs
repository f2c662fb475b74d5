//! Call Context
//!
//! Immutable identity for one executor call. The context travels as a plain
//! parameter alongside the request; nothing in the engine renames a shared
//! object to change who is "speaking".

use crate::update::WorkflowType;

/// Identity of the agent performing one call, fixed at call-site construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentContext {
    agent_name: String,
    workflow_type: WorkflowType,
    display_name: Option<String>,
}

impl AgentContext {
    pub fn new(agent_name: impl Into<String>, workflow_type: WorkflowType) -> Self {
        Self {
            agent_name: agent_name.into(),
            workflow_type,
            display_name: None,
        }
    }

    /// Set the human-facing display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn workflow_type(&self) -> WorkflowType {
        self.workflow_type
    }

    /// Display name if one was set, otherwise the agent name.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.agent_name)
    }
}
