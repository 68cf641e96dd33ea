//! Consecutive-pull-failure circuit breaker.
//!
//! Unlike the teacher's general-purpose `CircuitBreaker` (closed/open/half-open, timeout-based
//! recovery, applicable to any fallible operation), the dispatcher's breaker is narrower by
//! design (see `SPEC_FULL.md` §4.6.7 and `DESIGN.md`'s OQ2): it counts only consecutive
//! `Backend::pull` failures, never self-heals within a single `Spine::run`, and terminates the
//! run outright once the threshold is reached. A fresh `run()` call starts a fresh breaker.
//!
//! # Example
//!
//! ```rust
//! use spine_runtime::circuit_breaker::PullFailureBreaker;
//!
//! let breaker = PullFailureBreaker::new(3);
//! breaker.record_failure();
//! breaker.record_failure();
//! assert!(!breaker.is_tripped());
//! breaker.record_failure();
//! assert!(breaker.is_tripped());
//!
//! breaker.record_success();
//! assert!(!breaker.is_tripped());
//! assert_eq!(breaker.consecutive_failures(), 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks consecutive `Backend::pull` failures and reports when the configured threshold has
/// been reached.
#[derive(Debug)]
pub struct PullFailureBreaker {
    threshold: u64,
    consecutive_failures: AtomicU64,
}

impl PullFailureBreaker {
    /// Create a breaker that trips once `threshold` consecutive failures are recorded.
    #[must_use]
    pub const fn new(threshold: u64) -> Self {
        Self {
            threshold,
            consecutive_failures: AtomicU64::new(0),
        }
    }

    /// Record one pull failure, incrementing the consecutive-failure counter.
    ///
    /// Returns the counter's new value.
    pub fn record_failure(&self) -> u64 {
        let count = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.threshold {
            tracing::error!(
                consecutive_failures = count,
                threshold = self.threshold,
                "pull failure breaker tripped"
            );
        } else {
            tracing::warn!(
                consecutive_failures = count,
                threshold = self.threshold,
                "backend pull failed"
            );
        }
        count
    }

    /// Record one successful pull, resetting the consecutive-failure counter to zero.
    pub fn record_success(&self) {
        if self.consecutive_failures.swap(0, Ordering::SeqCst) > 0 {
            tracing::debug!("pull failure breaker reset after successful pull");
        }
    }

    /// Whether the breaker has reached its threshold.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.consecutive_failures.load(Ordering::SeqCst) >= self.threshold
    }

    /// The current consecutive-failure count.
    #[must_use]
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_untripped() {
        let breaker = PullFailureBreaker::new(3);
        assert!(!breaker.is_tripped());
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn trips_exactly_at_threshold() {
        let breaker = PullFailureBreaker::new(3);
        breaker.record_failure();
        assert!(!breaker.is_tripped());
        breaker.record_failure();
        assert!(!breaker.is_tripped());
        breaker.record_failure();
        assert!(breaker.is_tripped());
        assert_eq!(breaker.consecutive_failures(), 3);
    }

    #[test]
    fn success_resets_counter() {
        let breaker = PullFailureBreaker::new(3);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(!breaker.is_tripped());
    }

    #[test]
    fn stays_tripped_until_a_success_arrives() {
        let breaker = PullFailureBreaker::new(1);
        breaker.record_failure();
        assert!(breaker.is_tripped());
        breaker.record_failure();
        assert!(breaker.is_tripped());
    }
}
