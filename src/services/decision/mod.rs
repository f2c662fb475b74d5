//! Query Classification
//!
//! The decision engine, its reply parser, and the pending-clarification
//! store that lets a suspended strategy resume.

pub mod engine;
mod parse;
pub mod pending;

pub use engine::WorkflowDecisionEngine;
pub use pending::ClarificationStore;
