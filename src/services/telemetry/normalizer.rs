//! Event Normalizer
//!
//! Classifies raw telemetry into canonical updates, or drops it. Producers
//! shape their payloads differently (nested under several keys, lists of
//! content blocks, flat maps); everything that reaches an observer goes
//! through the ladder here, first match wins.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use switchboard_core::{CanonicalUpdate, UpdateType, WorkflowType};

use crate::services::agents::AgentRegistry;
use crate::services::planner::extract_json_value;

use super::event::RawEvent;

/// Character cap for result previews in update messages.
const RESULT_PREVIEW_CHARS: usize = 200;

/// Character cap for tool-argument previews.
const ARGS_PREVIEW_CHARS: usize = 120;

/// Tool names whose call echoes are engine bookkeeping, never shown.
const INTERNAL_TOOLS: &[&str] = &["ask_user"];

/// Keys under which producers nest their real payload.
const PAYLOAD_KEYS: &[&str] = &["content", "message", "data", "delta"];

fn is_internal_tool(name: &str) -> bool {
    name.starts_with("__") || INTERNAL_TOOLS.contains(&name)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Unwraps the payload's content: the payload itself when it is already a
/// list or scalar, otherwise the first known nesting key present.
fn content_of(payload: &Value) -> &Value {
    if let Value::Object(map) = payload {
        for key in PAYLOAD_KEYS {
            if let Some(inner) = map.get(*key) {
                if let Value::Object(inner_map) = inner {
                    if let Some(content) = inner_map.get("content") {
                        return content;
                    }
                }
                return inner;
            }
        }
    }
    payload
}

fn block_as_tool_use(block: &Value) -> Option<(String, Value)> {
    let map = block.as_object()?;
    let tagged = map.get("type").and_then(|t| t.as_str()) == Some("tool_use");
    if !tagged && !(map.contains_key("name") && map.contains_key("input")) {
        return None;
    }
    let name = map.get("name")?.as_str()?.to_string();
    let input = map.get("input").cloned().unwrap_or(Value::Null);
    Some((name, input))
}

/// A tool invocation anywhere in the content: a tagged block, a bare
/// `{name, input}` map, or the flat `{tool_name, arguments}` shape.
fn find_tool_use(payload: &Value) -> Option<(String, Value)> {
    let content = content_of(payload);
    if let Value::Array(blocks) = content {
        if let Some(found) = blocks.iter().find_map(block_as_tool_use) {
            return Some(found);
        }
    } else if let Some(found) = block_as_tool_use(content) {
        return Some(found);
    }

    let map = payload.as_object()?;
    let name = map.get("tool_name")?.as_str()?.to_string();
    let args = map.get("arguments").cloned().unwrap_or(Value::Null);
    Some((name, args))
}

fn block_as_tool_result(block: &Value) -> Option<(String, bool)> {
    let map = block.as_object()?;
    let tagged = map.get("type").and_then(|t| t.as_str()) == Some("tool_result");
    if !tagged && !(map.contains_key("content") && map.contains_key("is_error")) {
        return None;
    }
    let text = match map.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let is_error = map.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false);
    Some((text, is_error))
}

fn find_tool_result(payload: &Value) -> Option<(String, bool)> {
    let content = content_of(payload);
    if let Value::Array(blocks) = content {
        blocks.iter().find_map(block_as_tool_result)
    } else {
        block_as_tool_result(content).or_else(|| block_as_tool_result(payload))
    }
}

/// First readable text in the payload.
fn first_text(payload: &Value) -> Option<String> {
    fn from_value(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Object(map) => map
                .get("text")
                .and_then(|t| t.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
            _ => None,
        }
    }

    let content = content_of(payload);
    match content {
        Value::Array(blocks) => blocks.iter().find_map(from_value),
        other => from_value(other).or_else(|| from_value(payload)),
    }
}

/// Human-facing title for a step label.
fn step_title(update_type: UpdateType) -> &'static str {
    match update_type {
        UpdateType::Thinking => "Thinking",
        UpdateType::Chatting => "Chatting",
        UpdateType::CallingTool => "Calling Tool",
        UpdateType::ToolResult => "Tool Result",
        UpdateType::Plan => "Plan",
        UpdateType::Routing => "Routing",
        UpdateType::Running => "Running",
        UpdateType::Clarification => "Clarification",
        UpdateType::Result => "Result",
        UpdateType::Error => "Error",
        UpdateType::Cancelled => "Cancelled",
    }
}

/// Per-query classifier from raw telemetry to canonical updates.
pub struct EventNormalizer {
    query_id: String,
    workflow_type: Option<WorkflowType>,
    registry: Arc<AgentRegistry>,
}

impl EventNormalizer {
    pub fn new(query_id: impl Into<String>, registry: Arc<AgentRegistry>) -> Self {
        Self {
            query_id: query_id.into(),
            workflow_type: None,
            registry,
        }
    }

    pub fn with_workflow(mut self, workflow_type: WorkflowType) -> Self {
        self.workflow_type = Some(workflow_type);
        self
    }

    /// Classification ladder, first match wins. `None` means dropped.
    pub fn classify(&self, event: &RawEvent) -> Option<CanonicalUpdate> {
        // 1. Explicit progress-action tag.
        if let Some(action) = event.action.as_deref() {
            let lowered = action.trim().to_ascii_lowercase();
            if lowered == "initialized" || lowered == "unknown" {
                return None;
            }
            if let Some(update_type) = UpdateType::from_label(action) {
                let message = self.derive_message(event, update_type);
                let data = event
                    .payload
                    .get("data")
                    .filter(|v| !v.is_null())
                    .cloned();
                return Some(self.build(update_type, message, data));
            }
            // Unrecognized tags fall through to the structural rules.
        }

        // 2. A tool invocation anywhere in the content. Internal echoes
        //    and framework-level calls are filtered, never forwarded.
        if let Some((name, input)) = find_tool_use(&event.payload) {
            if is_internal_tool(&name) || event.namespace.starts_with("framework.") {
                debug!(tool = %name, "internal tool-call echo filtered");
                return None;
            }
            let message = format!(
                "Calling tool: {} ({})",
                name,
                truncate(&input.to_string(), ARGS_PREVIEW_CHARS)
            );
            let data = json!({"tool": name, "arguments": input});
            return Some(self.build(UpdateType::CallingTool, message, Some(data)));
        }

        // 3. A tool result: content plus an explicit error flag.
        if let Some((content, is_error)) = find_tool_result(&event.payload) {
            let message = if is_error {
                format!("Tool error: {}", truncate(&content, RESULT_PREVIEW_CHARS))
            } else {
                truncate(&content, RESULT_PREVIEW_CHARS)
            };
            return Some(self.build(
                UpdateType::ToolResult,
                message,
                Some(json!({"is_error": is_error})),
            ));
        }

        // 4. Planner output whose text parses as a JSON plan. High-value
        //    and rare, so this beats every namespace filter below.
        if event.namespace.contains("planner") {
            if let Some(text) = first_text(&event.payload) {
                if let Some(plan) = extract_json_value(&text).filter(|v| v.get("steps").is_some())
                {
                    let steps = plan
                        .get("steps")
                        .and_then(|s| s.as_array())
                        .map(|a| a.len())
                        .unwrap_or(0);
                    let message = format!("Plan with {} steps", steps);
                    return Some(self.build(UpdateType::Plan, message, Some(plan)));
                }
            }
        }

        // 5. Namespace fallback.
        if event.namespace.contains("routing") {
            let message = first_text(&event.payload)
                .unwrap_or_else(|| format!("Routing to {}", self.display_name(event)));
            return Some(self.build(UpdateType::Routing, message, None));
        }
        if event.namespace.starts_with("framework.") {
            return None;
        }
        if event.namespace.starts_with("agent.") || event.namespace.contains("model") {
            let message = self.derive_message(event, UpdateType::Running);
            return Some(self.build(UpdateType::Running, message, None));
        }

        // 6. Unknown, dropped.
        None
    }

    /// First text block when there is one, otherwise "<agent>: <step>".
    fn derive_message(&self, event: &RawEvent, update_type: UpdateType) -> String {
        match first_text(&event.payload) {
            Some(text) => truncate(&text, RESULT_PREVIEW_CHARS),
            None => format!("{}: {}", self.display_name(event), step_title(update_type)),
        }
    }

    /// Explicit context fields win; the namespace is only consulted when
    /// nothing else names the agent.
    fn display_name(&self, event: &RawEvent) -> String {
        for key in ["display_name", "agent_display_name"] {
            if let Some(name) = event.context_str(key) {
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }

        if let Some(name) = event.context_str("agent_name") {
            return self.resolve_agent_display(name);
        }

        if let Some(rest) = event.namespace.strip_prefix("agent.") {
            let name = rest.split('.').next().unwrap_or(rest);
            return self.resolve_agent_display(name);
        }

        "Engine".to_string()
    }

    fn resolve_agent_display(&self, name: &str) -> String {
        self.registry
            .display_name(name)
            .map(str::to_string)
            .unwrap_or_else(|| crate::services::agents::title_case(name))
    }

    fn build(
        &self,
        update_type: UpdateType,
        message: String,
        data: Option<Value>,
    ) -> CanonicalUpdate {
        let mut update = CanonicalUpdate::new(&self.query_id, update_type, message);
        if let Some(data) = data {
            update = update.with_data(data);
        }
        if let Some(workflow_type) = self.workflow_type {
            update = update.with_workflow(workflow_type);
        }
        update
    }
}
