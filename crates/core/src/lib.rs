//! Switchboard Core
//!
//! Shared contract types for the switchboard workspace. This crate has zero
//! dependencies on engine-level code (HTTP clients, model providers, the
//! orchestrator) and holds only what every layer agrees on.
//!
//! ## Module Organization
//!
//! - `update` - Canonical update types (`CanonicalUpdate`, `UpdateType`, `WorkflowType`)
//! - `context` - Immutable per-call identity (`AgentContext`)
//! - `sink` - Delivery contract (`UpdateSink`, `DeliveryError`)
//!
//! ## Design Principles
//!
//! 1. **Minimal dependencies** - serde/async-trait/thiserror/chrono only
//! 2. **Trait-based delivery seam** - transports implement `UpdateSink` outside this workspace
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod context;
pub mod sink;
pub mod update;

// ── Canonical Updates ──────────────────────────────────────────────────
pub use update::{CanonicalUpdate, UpdateType, WorkflowType};

// ── Call Context ───────────────────────────────────────────────────────
pub use context::AgentContext;

// ── Delivery Contract ──────────────────────────────────────────────────
pub use sink::{DeliveryError, UpdateSink};
