//! Tool Server Contract
//!
//! Remote tool catalogs are consumed through this trait: list what the
//! server offers, invoke one tool by name. Implementations live behind
//! `Arc<dyn ToolServer>` so tests can substitute in-process fakes.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use switchboard_llm::ToolSpec;

use super::result::ToolOutcome;

/// Tool-protocol failure classes.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No reachable server offers a tool with this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool server unreachable: {0}")]
    Unreachable(String),

    /// The server accepted the call but could not run it.
    #[error("tool call failed: {0}")]
    CallFailed(String),

    #[error("malformed tool response: {0}")]
    MalformedResponse(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

pub type ToolServerResult<T> = Result<T, ToolError>;

/// One remote tool catalog.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Server name for logs and routing diagnostics.
    fn name(&self) -> &str;

    /// Tools this server offers.
    async fn list_tools(&self) -> ToolServerResult<Vec<ToolSpec>>;

    /// Invoke one tool by name.
    ///
    /// A `ToolOutcome` with `success == false` is a tool-level failure the
    /// model can recover from; a `ToolError` means the protocol itself broke.
    async fn call(&self, name: &str, args: &Value) -> ToolServerResult<ToolOutcome>;
}
