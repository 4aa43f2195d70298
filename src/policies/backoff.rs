//! # Backoff policy for relaunching crashed children.
//!
//! [`BackoffPolicy`] controls how relaunch delays grow after repeated
//! failures. It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for attempt `n` is computed as `first × factor^n`, clamped to
//! `max`, then jitter is applied. Because the base delay is derived purely
//! from the attempt number, jitter output never feeds back into subsequent
//! calculations — this prevents the negative feedback loop that causes
//! delays to shrink over time.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! // Attempt 0 — uses 'first' (100ms)
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//!
//! // Attempt 1 — first × factor^1 = 200ms
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//!
//! // Attempt 10 — 100ms × 2^10 = 102_400ms → capped at max=10s
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Relaunch backoff policy.
///
/// Encapsulates parameters that determine how relaunch delays grow:
/// - [`BackoffPolicy::factor`] — multiplicative growth factor;
/// - [`BackoffPolicy::first`] — the initial delay;
/// - [`BackoffPolicy::max`] — the maximum delay cap.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Initial delay before the first relaunch.
    pub first: Duration,
    /// Maximum delay cap for relaunches.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy to prevent thundering herd.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a strategy with:
    /// - `factor = 2.0` (exponential growth);
    /// - `first = 100ms`;
    /// - `max = 30s`.
    ///
    /// The growth keeps a crash-looping child from hot-spinning while still
    /// retrying indefinitely.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            jitter: JitterPolicy::None,
            factor: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// The base delay is `first × factor^attempt`, clamped to
    /// [`BackoffPolicy::max`]. Jitter is applied to the clamped base, but
    /// the result is **never** fed back into subsequent calculations — each
    /// attempt derives its base independently.
    ///
    /// # Notes
    /// - If `factor` is less than 1.0, delays decrease with higher attempts.
    /// - If `factor` equals 1.0, delay remains constant at `first`.
    /// - If `factor` is greater than 1.0, delays grow exponentially up to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(first_ms: u64, max_s: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_secs(max_s),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn attempt_zero_returns_first() {
        assert_eq!(policy(100, 30, 2.0).next(0), Duration::from_millis(100));
    }

    #[test]
    fn delays_grow_exponentially() {
        let p = policy(100, 30, 2.0);
        assert_eq!(p.next(1), Duration::from_millis(200));
        assert_eq!(p.next(2), Duration::from_millis(400));
        assert_eq!(p.next(3), Duration::from_millis(800));
    }

    #[test]
    fn delays_are_capped_at_max() {
        let p = policy(100, 10, 2.0);
        assert_eq!(p.next(30), Duration::from_secs(10));
        // Overflow-prone exponents still clamp to max.
        assert_eq!(p.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn constant_factor_keeps_first() {
        let p = policy(250, 30, 1.0);
        assert_eq!(p.next(0), Duration::from_millis(250));
        assert_eq!(p.next(7), Duration::from_millis(250));
    }
}
