//! Raw telemetry events and their normalization into canonical updates.

pub mod event;
pub mod normalizer;

pub use event::{namespaces, RawEvent};
pub use normalizer::EventNormalizer;
