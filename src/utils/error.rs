//! Error Handling
//!
//! Unified error types for the engine.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use switchboard_llm::ModelError;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// Query rejected before entering the pipeline
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream model capacity exhausted, circuit breaker engaged
    #[error("Service overloaded, cooling down before accepting new work")]
    Overloaded,

    /// Model invocation errors (auto-converted from ModelError)
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// An attachment finished processing in an error state
    #[error("File processing failed for {file_id}: {detail}")]
    FileProcessing { file_id: String, detail: String },

    /// Attachments still pending when the readiness deadline passed
    #[error("File processing timed out after {timeout_secs}s ({pending} still pending)")]
    FileProcessingTimeout { timeout_secs: u64, pending: usize },

    /// Run interrupted by a cancellation request
    #[error("Cancelled")]
    Cancelled,

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine errors
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error came from upstream saturation
    pub fn is_overloaded(&self) -> bool {
        match self {
            Self::Overloaded => true,
            Self::Model(e) => e.is_overload(),
            _ => false,
        }
    }
}

/// Convert EngineError to a string suitable for host-facing responses
impl From<EngineError> for String {
    fn from(err: EngineError) -> String {
        err.to_string()
    }
}
