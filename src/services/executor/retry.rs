//! Model Call Resilience
//!
//! The one wrapper every model invocation goes through: breaker check before
//! and after the call, bounded exponential backoff for transient failures,
//! immediate trip-and-abort on overload. Overload is never retried.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use switchboard_llm::{
    ChatMessage, ChatResponse, ModelApi, RequestParams, SystemBlock, ToolSpec,
};

use crate::config::RetryConfig;
use crate::services::breaker::CircuitBreaker;
use crate::utils::{EngineError, EngineResult};

/// One model call under the full resilience envelope.
///
/// Retries only transient failures (rate limit, timeout), re-raising the
/// underlying error unwrapped once attempts are exhausted. A success that
/// lands after a concurrent trip is discarded as overloaded.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn resilient_chat(
    model: &dyn ModelApi,
    breaker: &CircuitBreaker,
    retry: &RetryConfig,
    messages: &[ChatMessage],
    system: &[SystemBlock],
    tools: &[ToolSpec],
    params: &RequestParams,
    cancel: &CancellationToken,
) -> EngineResult<ChatResponse> {
    let mut attempt: u32 = 0;
    loop {
        if breaker.is_tripped() {
            return Err(EngineError::Overloaded);
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            outcome = model.chat(messages, system, tools, params) => outcome,
        };

        match outcome {
            Ok(response) => {
                if breaker.is_tripped() {
                    return Err(EngineError::Overloaded);
                }
                return Ok(response);
            }
            Err(err) if err.is_overload() => {
                breaker.trip();
                return Err(EngineError::Model(err));
            }
            Err(err) if err.is_transient() && attempt + 1 < retry.max_attempts => {
                let delay = backoff_delay(retry, attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient model failure, backing off"
                );
                attempt += 1;
                tokio::select! {
                    _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                    _ = sleep(delay) => {}
                }
            }
            Err(err) => {
                if err.is_transient() {
                    warn!(attempts = retry.max_attempts, error = %err, "transient retries exhausted");
                }
                return Err(EngineError::Model(err));
            }
        }
    }
}

/// base * 2^attempt, capped.
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let scaled = retry.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(scaled.min(retry.max_delay_ms))
}
