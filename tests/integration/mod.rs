//! Integration Tests
//!
//! End-to-end pipeline tests against scripted collaborators: a queue-backed
//! model, in-memory file and history stores, and recording update sinks.
//! Each scenario drives the engine through its public surface only.

// Shared scripted collaborators and the engine rig
mod support;

// Direct answers, single-agent runs, and validation rejection
mod pipeline_test;

// Clarification suspend/resume round trips
mod clarification_test;

// Circuit breaker windows, overload propagation, delivery retries
mod resilience_test;

// Concurrency cap, FIFO release, cancellation mid-run
mod concurrency_test;

// Attachment readiness: fail-fast, timeout, pass-through
mod attachments_test;
