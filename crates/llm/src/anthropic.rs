//! Anthropic-Compatible Client
//!
//! Non-streaming messages-API client. Serializes whatever cache markers the
//! request types carry; marker placement policy lives with the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::provider::{classify_http_error, missing_api_key_error, ModelApi};
use super::types::{
    CacheControl, CacheTtl, ChatMessage, ChatResponse, ContentBlock, ModelError, ModelResult,
    RequestParams, StopReason, SystemBlock, TokenUsage, ToolSpec,
};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const MESSAGES_PATH: &str = "/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Beta flag required for the one-hour cache tier.
const EXTENDED_TTL_BETA: &str = "extended-cache-ttl-2025-04-11";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Reqwest-backed client for the Anthropic messages API (and compatible
/// gateways).
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> ModelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ModelError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Point the client at a compatible gateway instead of the default host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, MESSAGES_PATH)
    }

    fn cache_control_value(control: &CacheControl) -> Value {
        match control.ttl {
            // 5m is the API default; sending only the type keeps the wire shape minimal.
            CacheTtl::FiveMinutes => json!({"type": "ephemeral"}),
            CacheTtl::OneHour => json!({"type": "ephemeral", "ttl": "1h"}),
        }
    }

    fn content_block_value(block: &ContentBlock) -> Value {
        match block {
            ContentBlock::Text { text } => json!({"type": "text", "text": text}),
            ContentBlock::Image { media_type, data } => json!({
                "type": "image",
                "source": {"type": "base64", "media_type": media_type, "data": data},
            }),
            ContentBlock::ToolUse { id, name, input } => json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": input,
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            }),
        }
    }

    /// Builds the request body. A message-level cache marker lands on the
    /// message's final content block, per the upstream convention.
    fn build_request_body(
        messages: &[ChatMessage],
        system: &[SystemBlock],
        tools: &[ToolSpec],
        params: &RequestParams,
    ) -> Value {
        let api_messages: Vec<Value> = messages
            .iter()
            .map(|msg| {
                let mut blocks: Vec<Value> =
                    msg.content.iter().map(Self::content_block_value).collect();
                if let (Some(control), Some(last)) = (&msg.cache_control, blocks.last_mut()) {
                    last["cache_control"] = Self::cache_control_value(control);
                }
                json!({
                    "role": match msg.role {
                        super::types::Role::User => "user",
                        super::types::Role::Assistant => "assistant",
                    },
                    "content": blocks,
                })
            })
            .collect();

        let mut body = json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "messages": api_messages,
        });

        if !system.is_empty() {
            let system_blocks: Vec<Value> = system
                .iter()
                .map(|block| {
                    let mut value = json!({"type": "text", "text": block.text});
                    if let Some(control) = &block.cache_control {
                        value["cache_control"] = Self::cache_control_value(control);
                    }
                    value
                })
                .collect();
            body["system"] = Value::Array(system_blocks);
        }

        if !tools.is_empty() {
            let tool_values: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    let mut value = json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.input_schema,
                    });
                    if let Some(control) = &tool.cache_control {
                        value["cache_control"] = Self::cache_control_value(control);
                    }
                    value
                })
                .collect();
            body["tools"] = Value::Array(tool_values);
        }

        body
    }

    fn uses_extended_ttl(
        messages: &[ChatMessage],
        system: &[SystemBlock],
        tools: &[ToolSpec],
    ) -> bool {
        let long = |c: &Option<CacheControl>| matches!(c, Some(c) if c.ttl == CacheTtl::OneHour);
        messages.iter().any(|m| long(&m.cache_control))
            || system.iter().any(|s| long(&s.cache_control))
            || tools.iter().any(|t| long(&t.cache_control))
    }
}

#[async_trait]
impl ModelApi for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        system: &[SystemBlock],
        tools: &[ToolSpec],
        params: &RequestParams,
    ) -> ModelResult<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(missing_api_key_error(self.name()));
        }

        let body = Self::build_request_body(messages, system, tools, params);
        debug!(model = %params.model, messages = messages.len(), tools = tools.len(), "sending chat request");

        let mut request = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json");

        if Self::uses_extended_ttl(messages, system, tools) {
            request = request.header("anthropic-beta", EXTENDED_TTL_BETA);
        }

        let response = request.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(format!("request to {} timed out", self.endpoint()))
            } else {
                ModelError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status, &error_body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;

        Ok(api_response.into_chat_response())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    stop_reason: Option<String>,
    model: String,
    #[serde(default)]
    usage: ApiUsage,
}

impl ApiResponse {
    fn into_chat_response(self) -> ChatResponse {
        let content = self
            .content
            .into_iter()
            .map(|block| match block {
                ApiContentBlock::Text { text } => ContentBlock::Text { text },
                ApiContentBlock::ToolUse { id, name, input } => {
                    ContentBlock::ToolUse { id, name, input }
                }
            })
            .collect();

        let stop_reason = self
            .stop_reason
            .as_deref()
            .map(StopReason::from)
            .unwrap_or(StopReason::EndTurn);

        ChatResponse {
            content,
            stop_reason,
            usage: TokenUsage {
                input_tokens: self.usage.input_tokens,
                output_tokens: self.usage.output_tokens,
                cache_read_tokens: self.usage.cache_read_input_tokens.unwrap_or(0),
                cache_creation_tokens: self.usage.cache_creation_input_tokens.unwrap_or(0),
            },
            model: self.model,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ApiContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    cache_read_input_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
}
