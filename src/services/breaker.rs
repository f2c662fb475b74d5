//! Circuit Breaker
//!
//! Process-wide overload guard. Any caller that detects an overload-class
//! upstream failure trips the breaker; every caller checks it before
//! contacting the model and bails immediately while it is open. The breaker
//! closes again lazily: the first check after the cool-down elapses performs
//! the reset. Nobody ever blocks waiting on it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

const DEFAULT_RESET_AFTER: Duration = Duration::from_secs(30);

/// Shared overload guard, constructed once at engine start and injected
/// into every component that talks upstream.
pub struct CircuitBreaker {
    /// Fixed reference point for the monotonic millisecond clock below
    anchor: Instant,
    /// Milliseconds since `anchor` at trip time, 0 while closed
    tripped_at_ms: AtomicU64,
    reset_after: Duration,
}

impl CircuitBreaker {
    pub fn new(reset_after: Duration) -> Self {
        Self {
            anchor: Instant::now(),
            tripped_at_ms: AtomicU64::new(0),
            reset_after,
        }
    }

    fn now_ms(&self) -> u64 {
        // Clamped to 1 so a trip in the very first millisecond is
        // distinguishable from the closed sentinel.
        (self.anchor.elapsed().as_millis() as u64).max(1)
    }

    /// Open the breaker. Tripping an already-open breaker keeps the
    /// original trip time, so concurrent trips never extend the cool-down.
    pub fn trip(&self) {
        let now = self.now_ms();
        if self
            .tripped_at_ms
            .compare_exchange(0, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            warn!(
                reset_after_secs = self.reset_after.as_secs(),
                "circuit breaker tripped, refusing upstream calls"
            );
        }
    }

    /// Whether callers must short-circuit right now. Performs the lazy
    /// reset when the cool-down has elapsed.
    pub fn is_tripped(&self) -> bool {
        let tripped_at = self.tripped_at_ms.load(Ordering::SeqCst);
        if tripped_at == 0 {
            return false;
        }

        let elapsed = self.now_ms().saturating_sub(tripped_at);
        if elapsed >= self.reset_after.as_millis() as u64 {
            // First caller past the deadline closes it; a racing trip that
            // already re-opened it wins the exchange and stays.
            if self
                .tripped_at_ms
                .compare_exchange(tripped_at, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                info!("circuit breaker cool-down elapsed, closing");
            }
            return false;
        }

        true
    }

    /// Cool-down left before the breaker closes, `None` when closed.
    pub fn remaining(&self) -> Option<Duration> {
        let tripped_at = self.tripped_at_ms.load(Ordering::SeqCst);
        if tripped_at == 0 {
            return None;
        }
        let elapsed = self.now_ms().saturating_sub(tripped_at);
        let reset_ms = self.reset_after.as_millis() as u64;
        if elapsed >= reset_ms {
            None
        } else {
            Some(Duration::from_millis(reset_ms - elapsed))
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_AFTER)
    }
}
