//! # Jitter policy for relaunch delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays to prevent thundering
//! herd effects when multiple children relaunch simultaneously.
//!
//! - [`JitterPolicy::None`] — no randomization, predictable delays
//! - [`JitterPolicy::Full`] — random delay in [0, backoff_delay]
//! - [`JitterPolicy::Equal`] — delay = backoff_delay/2 + random[0, backoff_delay/2]
//! - [`JitterPolicy::Decorrelated`] — stateful jitter based on previous delay

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of relaunch delays.
///
/// Prevents synchronized relaunches across multiple children by adding
/// controlled randomness.
///
/// ## Trade-offs
/// - **None**: predictable, but risks thundering herd
/// - **Full**: maximum randomness, aggressive load spreading
/// - **Equal**: balanced (recommended for most use cases)
/// - **Decorrelated**: stateful, prevents relaunch correlation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JitterPolicy {
    /// No jitter: use exact backoff delay.
    ///
    /// Use when:
    /// - Only one child relaunching (no herd risk)
    /// - Predictable timing required
    /// - Testing/debugging
    #[default]
    None,

    /// Full jitter: random delay in [0, backoff_delay].
    ///
    /// Most aggressive jitter, can significantly reduce delay.
    Full,

    /// Equal jitter: delay = backoff_delay/2 + random[0, backoff_delay/2].
    ///
    /// Balances predictability with randomness. Preserves ~75% of the
    /// original backoff on average.
    Equal,

    /// Decorrelated jitter: delay = random[base, prev_delay * 3], capped at max.
    ///
    /// Considers the previous delay and grows independently. Requires
    /// context (base, prev, max) via [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    ///
    /// ### Note
    /// For `Decorrelated`, this method returns the input unchanged.
    /// Use [`apply_decorrelated`](Self::apply_decorrelated) instead, as it
    /// requires additional context (previous delay, base, max).
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => self.full_jitter(delay),
            JitterPolicy::Equal => self.equal_jitter(delay),
            JitterPolicy::Decorrelated => delay,
        }
    }

    /// Applies decorrelated jitter with full context.
    ///
    /// ### Note
    /// If called on a non-Decorrelated policy, falls back to `apply(prev)`.
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }

        let mut rng = rand::rng();
        let base_ms = base.as_millis() as u64;
        let prev_ms = prev.as_millis() as u64;
        let max_ms = max.as_millis() as u64;

        let upper_bound = (prev_ms.saturating_mul(3)).min(max_ms);
        let clamped_upper = upper_bound.max(base_ms);

        if base_ms >= clamped_upper {
            return base;
        }

        let jittered_ms = rng.random_range(base_ms..=clamped_upper);
        Duration::from_millis(jittered_ms)
    }

    /// Full jitter: random[0, delay]
    fn full_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.random_range(0..=ms))
    }

    /// Equal jitter: delay/2 + random[0, delay/2]
    fn equal_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let half = ms / 2;
        let jitter = if half == 0 {
            0
        } else {
            rng.random_range(0..=half)
        };
        Duration::from_millis(half + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(500);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_stays_in_range() {
        let d = Duration::from_millis(500);
        for _ in 0..100 {
            let out = JitterPolicy::Full.apply(d);
            assert!(out <= d);
        }
    }

    #[test]
    fn equal_preserves_lower_half() {
        let d = Duration::from_millis(500);
        for _ in 0..100 {
            let out = JitterPolicy::Equal.apply(d);
            assert!(out >= Duration::from_millis(250));
            assert!(out <= d);
        }
    }

    #[test]
    fn decorrelated_respects_cap() {
        let base = Duration::from_millis(100);
        let prev = Duration::from_secs(20);
        let max = Duration::from_secs(30);
        for _ in 0..100 {
            let out = JitterPolicy::Decorrelated.apply_decorrelated(base, prev, max);
            assert!(out >= base);
            assert!(out <= max);
        }
    }
}
