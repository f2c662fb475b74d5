//! Switchboard - Query Orchestration Engine
//!
//! Routes a natural-language query (plus attachments and conversation
//! history) to a direct answer, one tool-using agent, or a multi-step
//! planned execution, and streams normalized progress updates to exactly
//! one observer per query. Includes:
//! - Workflow classification with a clarification suspend/resume protocol
//! - A resilient agentic executor (retry, circuit breaker, prompt caching)
//! - Attachment readiness gating and bounded upstream concurrency
//! - Telemetry normalization and ordered, retrying update delivery

pub mod config;
pub mod models;
pub mod services;
pub mod utils;

// Configuration
pub use config::EngineConfig;

// Domain types
pub use models::{
    ConversationTurn, Decision, ExecutionRequest, PendingClarification, Query, QueryOrigin,
    QueryOutcome, RunSummary, Strategy,
};

// The engine and its seams
pub use services::{
    AgentProfile, AgentRegistry, CircuitBreaker, ClarificationStore, ConcurrencyGate,
    EventNormalizer, FileReadinessGate, FileRecord, FileStatus, FileStatusRepository,
    InMemoryHistory, InteractionBroker, MessageHistoryRepository, PromptCachePlanner,
    QueryOrchestrator, RawEvent, ResilientLlmExecutor, UpdateChannel, WorkflowDecisionEngine,
};

// Shared wire types from the library crates
pub use switchboard_core::{CanonicalUpdate, DeliveryError, UpdateSink, UpdateType, WorkflowType};
pub use switchboard_llm::{ModelApi, ModelError, TokenUsage};
pub use switchboard_tools::{ToolError, ToolOutcome, ToolRouter, ToolServer};

pub use utils::error::{EngineError, EngineResult};
