//! Model API Contract
//!
//! The single seam between the engine and any chat-completion backend, plus
//! shared HTTP error classification for concrete clients.

use async_trait::async_trait;

use super::types::{ChatMessage, ChatResponse, ModelError, ModelResult, RequestParams, SystemBlock, ToolSpec};

/// A chat-completion backend with tool calling.
///
/// The engine holds implementations as `Arc<dyn ModelApi>` so tests can
/// substitute scripted fakes.
#[async_trait]
pub trait ModelApi: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Model identifier sent upstream by default.
    fn model(&self) -> &str;

    /// One complete chat turn: messages in, parsed response out.
    ///
    /// # Arguments
    /// * `messages` - Conversation turns, oldest first
    /// * `system` - System prompt segments
    /// * `tools` - Tool catalog offered to the model
    /// * `params` - Per-call parameters (model, limits, temperature)
    async fn chat(
        &self,
        messages: &[ChatMessage],
        system: &[SystemBlock],
        tools: &[ToolSpec],
        params: &RequestParams,
    ) -> ModelResult<ChatResponse>;
}

/// Helper to create an error for a missing API key.
pub fn missing_api_key_error(backend: &str) -> ModelError {
    ModelError::AuthenticationFailed(format!("API key not configured for {}", backend))
}

/// Extracts `error.type` and `error.message` from an upstream error body,
/// falling back to the raw body.
fn parse_error_body(body: &str) -> (Option<String>, String) {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error_type = value["error"]["type"].as_str().map(|s| s.to_string());
        if let Some(message) = value["error"]["message"].as_str() {
            return (error_type, message.to_string());
        }
        if error_type.is_some() {
            return (error_type, body.to_string());
        }
    }
    (None, body.to_string())
}

/// Maps an HTTP error status and body to a typed `ModelError`.
///
/// 529 and `overloaded_error` payloads form the overload class; 429 and 408
/// are transient. Everything else is fatal to the observing run.
pub fn classify_http_error(status: u16, body: &str) -> ModelError {
    let (error_type, message) = parse_error_body(body);

    if error_type.as_deref() == Some("overloaded_error") {
        return ModelError::Overloaded(message);
    }

    match status {
        401 => ModelError::AuthenticationFailed("invalid API key".to_string()),
        403 => ModelError::AuthenticationFailed("access denied".to_string()),
        404 => ModelError::ModelNotFound(message),
        408 => ModelError::Timeout(message),
        400 => ModelError::InvalidRequest(message),
        429 => ModelError::RateLimited { retry_after: None },
        529 => ModelError::Overloaded(message),
        _ => ModelError::ServerError { status, message },
    }
}
