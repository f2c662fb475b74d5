//! Data Models
//!
//! Domain types used throughout the engine.

pub mod decision;
pub mod execution;
pub mod query;

pub use decision::*;
pub use execution::*;
pub use query::*;
