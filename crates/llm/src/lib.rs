//! Switchboard LLM
//!
//! Model-API layer for the switchboard engine: the `ModelApi` trait every
//! chat backend implements, the shared wire vocabulary (messages, content
//! blocks, tool specs, cache markers, usage), and an Anthropic-compatible
//! reqwest client.

pub mod anthropic;
pub mod provider;
pub mod types;

// Re-export main types
pub use anthropic::AnthropicClient;
pub use provider::{classify_http_error, missing_api_key_error, ModelApi};
pub use types::*;
