//! Canonical Updates
//!
//! The normalized, client-facing representation of one unit of query
//! progress. Raw execution telemetry never crosses the delivery boundary;
//! everything an observer sees is a `CanonicalUpdate`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Execution shape chosen for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// Answered directly, no tools and no agent run.
    Simple,
    /// Routed to one specialized tool-using agent.
    SingleAgent,
    /// Multi-step plan executed across several agents.
    Planned,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::Simple => "simple",
            WorkflowType::SingleAgent => "single_agent",
            WorkflowType::Planned => "planned",
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Step label carried by a canonical update.
///
/// The set is closed: telemetry that cannot be expressed with one of these
/// labels is dropped before it reaches a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Thinking,
    Chatting,
    CallingTool,
    ToolResult,
    Plan,
    Routing,
    Running,
    Clarification,
    Result,
    Error,
    Cancelled,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Thinking => "thinking",
            UpdateType::Chatting => "chatting",
            UpdateType::CallingTool => "calling_tool",
            UpdateType::ToolResult => "tool_result",
            UpdateType::Plan => "plan",
            UpdateType::Routing => "routing",
            UpdateType::Running => "running",
            UpdateType::Clarification => "clarification",
            UpdateType::Result => "result",
            UpdateType::Error => "error",
            UpdateType::Cancelled => "cancelled",
        }
    }

    /// Parses a step label, tolerating case and surrounding whitespace.
    /// Returns `None` for anything outside the canonical set.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "thinking" => Some(UpdateType::Thinking),
            "chatting" => Some(UpdateType::Chatting),
            "calling_tool" | "calling tool" => Some(UpdateType::CallingTool),
            "tool_result" | "tool result" => Some(UpdateType::ToolResult),
            "plan" => Some(UpdateType::Plan),
            "routing" => Some(UpdateType::Routing),
            "running" => Some(UpdateType::Running),
            "clarification" => Some(UpdateType::Clarification),
            "result" => Some(UpdateType::Result),
            "error" => Some(UpdateType::Error),
            "cancelled" => Some(UpdateType::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for UpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One normalized unit of progress for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalUpdate {
    /// Query this update belongs to. Delivery ordering is guaranteed only
    /// within one query id.
    pub query_id: String,
    pub update_type: UpdateType,
    /// Human-readable one-liner for the step.
    pub message: String,
    /// Structured payload for clients that want more than the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<WorkflowType>,
    pub timestamp: DateTime<Utc>,
}

impl CanonicalUpdate {
    pub fn new(
        query_id: impl Into<String>,
        update_type: UpdateType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            update_type,
            message: message.into(),
            data: None,
            workflow_type: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_workflow(mut self, workflow_type: WorkflowType) -> Self {
        self.workflow_type = Some(workflow_type);
        self
    }
}
