//! Update Sink
//!
//! Delivery contract between the engine and whatever transport carries
//! canonical updates to a client. The engine holds sinks as trait objects;
//! transports live outside this workspace.

use async_trait::async_trait;
use thiserror::Error;

use crate::update::CanonicalUpdate;

/// Why a push into a sink failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The connection behind the sink is gone. Not retried; the sink is
    /// marked closed by the delivery layer.
    #[error("connection closed")]
    Closed,
    /// A failure that may succeed on retry (full buffer, brief transport
    /// hiccup).
    #[error("transient delivery failure: {0}")]
    Transient(String),
}

impl DeliveryError {
    pub fn is_closed(&self) -> bool {
        matches!(self, DeliveryError::Closed)
    }
}

/// One live observer connection for a query.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    /// Pushes one update toward the observer. Implementations must not
    /// block on client-side consumption beyond their own buffering.
    async fn push(&self, query_id: &str, update: &CanonicalUpdate) -> Result<(), DeliveryError>;
}
