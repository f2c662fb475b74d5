//! Switchboard Tools
//!
//! Remote tool access for the orchestration engine.
//!
//! This crate provides the client side of the tool protocol:
//! - `ToolServer` trait - a named source of tools
//! - `HttpToolServer` - JSON-over-HTTP tool server client
//! - `ToolRouter` - catalog aggregation and call dispatch across servers
//! - `ToolOutcome` - normalized execution result fed back to the model

pub mod client;
pub mod result;
pub mod router;
pub mod server;

// Re-export core types
pub use client::{HttpToolServer, HttpToolServerConfig};
pub use result::ToolOutcome;
pub use router::ToolRouter;
pub use server::{ToolError, ToolServer, ToolServerResult};
