//! Model API Types
//!
//! Wire-level vocabulary shared by every model integration: chat messages,
//! content blocks, tool specifications, cache markers, usage accounting, and
//! the typed failure classification the engine's retry policy consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Lifetime tier for a cached request segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTtl {
    /// Short-lived reuse window, roughly five minutes.
    FiveMinutes,
    /// Extended reuse window, roughly one hour.
    OneHour,
}

impl CacheTtl {
    /// Wire representation understood by the upstream API.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            CacheTtl::FiveMinutes => "5m",
            CacheTtl::OneHour => "1h",
        }
    }
}

/// Marker asking the upstream API to cache the request prefix that ends at
/// the carrying segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControl {
    pub ttl: CacheTtl,
}

impl CacheControl {
    pub fn short() -> Self {
        Self {
            ttl: CacheTtl::FiveMinutes,
        }
    }

    pub fn long() -> Self {
        Self {
            ttl: CacheTtl::OneHour,
        }
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content block within a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Base64-encoded image payload.
    Image {
        media_type: String,
        data: String,
    },
    /// The model requesting one tool invocation.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Result of a tool invocation, fed back to the model.
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// True when the block carries nothing the model could read.
    pub fn is_empty(&self) -> bool {
        match self {
            ContentBlock::Text { text } => text.trim().is_empty(),
            ContentBlock::Image { data, .. } => data.is_empty(),
            ContentBlock::ToolUse { .. } => false,
            ContentBlock::ToolResult {
                content, is_error, ..
            } => content.trim().is_empty() && !is_error,
        }
    }

    /// Character count used for token estimation.
    pub fn char_len(&self) -> usize {
        match self {
            ContentBlock::Text { text } => text.len(),
            ContentBlock::Image { data, .. } => data.len(),
            ContentBlock::ToolUse { name, input, .. } => name.len() + input.to_string().len(),
            ContentBlock::ToolResult { content, .. } => content.len(),
        }
    }
}

/// One conversation turn sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    /// When present, serialized onto this message's final content block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
            cache_control: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
            cache_control: None,
        }
    }

    pub fn from_blocks(role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content,
            cache_control: None,
        }
    }

    /// Tool results travel on a user-role turn.
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }],
            cache_control: None,
        }
    }

    /// True when every block is empty (nothing for the model to read).
    pub fn is_empty(&self) -> bool {
        self.content.iter().all(|b| b.is_empty())
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    /// Character count across all blocks, for token estimation.
    pub fn char_len(&self) -> usize {
        self.content.iter().map(|b| b.char_len()).sum()
    }
}

/// One segment of the system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemBlock {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl SystemBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cache_control: None,
        }
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            cache_control: None,
        }
    }

    /// Character count across name, description, and schema.
    pub fn char_len(&self) -> usize {
        self.name.len() + self.description.len() + self.input_schema.to_string().len()
    }
}

/// A tool invocation extracted from a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural completion.
    EndTurn,
    /// Output token limit reached.
    MaxTokens,
    /// A configured stop sequence matched.
    StopSequence,
    /// The model wants one or more tools invoked.
    ToolUse,
    /// Anything the API reports that we do not model.
    Other(String),
}

impl From<&str> for StopReason {
    fn from(s: &str) -> Self {
        match s {
            "end_turn" | "stop" => StopReason::EndTurn,
            "max_tokens" | "length" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            "tool_use" => StopReason::ToolUse,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Token accounting for one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Tokens served from the upstream prompt cache.
    pub cache_read_tokens: u64,
    /// Tokens written into the upstream prompt cache.
    pub cache_creation_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate another call's usage into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_creation_tokens += other.cache_creation_tokens;
    }
}

/// Parsed model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
    pub model: String,
}

impl ChatResponse {
    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    /// Tool invocations requested by this response, in content order.
    pub fn tool_invocations(&self) -> Vec<ToolInvocation> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn wants_tools(&self) -> bool {
        self.stop_reason == StopReason::ToolUse
    }
}

/// Per-call request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Marks the call as part of a long-running workflow. Cache planning may
    /// then choose the extended tier for static segments.
    #[serde(default)]
    pub long_running: bool,
}

impl RequestParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 4096,
            temperature: 0.7,
            long_running: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn long_running(mut self) -> Self {
        self.long_running = true;
        self
    }
}

/// Model API failure classes.
///
/// The engine's retry loop branches on `is_transient()` and `is_overload()`;
/// everything else is fatal to the run that observed it.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Upstream asked us to slow down. Retried with backoff.
    #[error("rate limited")]
    RateLimited { retry_after: Option<u64> },

    /// The request did not complete in time. Retried with backoff.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The upstream reports it cannot take more load. Never retried; the
    /// caller trips the circuit breaker.
    #[error("upstream overloaded: {0}")]
    Overloaded(String),

    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ModelError {
    /// Failures worth retrying with bounded backoff: rate limits and
    /// timeouts. Everything else either trips the breaker or is fatal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. } | ModelError::Timeout(_)
        )
    }

    /// Overload-class failures trip the circuit breaker and abort.
    pub fn is_overload(&self) -> bool {
        matches!(self, ModelError::Overloaded(_))
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
