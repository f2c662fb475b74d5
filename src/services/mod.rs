//! Services
//!
//! The engine's moving parts. Shared state (breaker, gate) is constructed
//! once by the orchestrator and injected; everything else is per-query.

pub mod agents;
pub mod breaker;
pub mod cache_plan;
pub mod decision;
pub mod executor;
pub mod file_gate;
pub mod gate;
pub mod history;
pub mod interaction;
pub mod orchestrator;
pub mod planner;
pub mod telemetry;
pub mod updates;

pub use agents::{AgentProfile, AgentRegistry};
pub use breaker::CircuitBreaker;
pub use cache_plan::PromptCachePlanner;
pub use decision::{ClarificationStore, WorkflowDecisionEngine};
pub use executor::ResilientLlmExecutor;
pub use file_gate::{FileReadinessGate, FileRecord, FileStatus, FileStatusRepository};
pub use gate::ConcurrencyGate;
pub use history::{InMemoryHistory, MessageHistoryRepository};
pub use interaction::InteractionBroker;
pub use orchestrator::QueryOrchestrator;
pub use planner::Planner;
pub use telemetry::{namespaces, EventNormalizer, RawEvent};
pub use updates::UpdateChannel;
