//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for the supervision runtime.
//!
//! Config is used in two ways:
//! 1. **Monitor creation**: `Monitor::builder(config)`
//! 2. **ProcessSpec defaults**: `ProcessSpec::with_defaults(exe, &config)`
//!
//! ## Sentinel values
//! - `kill_escalation = 0s` → never escalate to SIGKILL (wait forever)
//! - `bus_capacity` is clamped to a minimum of 1 by the Bus

use std::time::Duration;

use crate::policies::{BackoffPolicy, RespawnPolicy};

/// Global configuration for the supervision runtime.
///
/// Defines:
/// - **Shutdown behavior**: grace period for graceful termination
/// - **Signal translation**: arming delay and post-SIGTERM wakeup delay
/// - **Escalation**: graceful-termination timeout before SIGKILL
/// - **Event system**: bus capacity for event delivery
/// - **Child defaults**: respawn policy and backoff strategy
///
/// ## Field semantics
/// - `grace`: maximum wait for children to stop at shutdown (`0s` = force immediately)
/// - `term_grace`: delay between a SIGHUP-triggered bulk SIGTERM and the
///   deferred `wakeup()` that reconciles supervision state
/// - `signal_arm_delay`: delay before the signal translator is armed,
///   so it never races the monitor's own startup sequence
/// - `kill_escalation`: how long a cancelled child gets to exit after
///   SIGTERM before SIGKILL (`0s` = no forced kill)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `respawn` / `backoff`: defaults inherited by `ProcessSpec::with_defaults`
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for graceful shutdown before giving up.
    ///
    /// When a shutdown signal is received:
    /// - children are cancelled via `CancellationToken` (SIGTERM each)
    /// - the monitor waits up to `grace` for handles to drain
    /// - on timeout, `run()` returns `RuntimeError::GraceExceeded`
    pub grace: Duration,

    /// Delay between the SIGHUP bulk-termination request and the deferred
    /// `wakeup()` that re-evaluates all handles.
    pub term_grace: Duration,

    /// Delay before the signal translator installs its handlers.
    pub signal_arm_delay: Duration,

    /// Time a cancelled child gets to exit after SIGTERM before SIGKILL.
    ///
    /// `Duration::ZERO` disables escalation: the runner waits indefinitely
    /// for the child to honor SIGTERM.
    pub kill_escalation: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Default respawn policy for children.
    ///
    /// Used by `ProcessSpec::with_defaults()`. Can be overridden per-child.
    pub respawn: RespawnPolicy,

    /// Default backoff policy for respawn delays.
    ///
    /// Used by `ProcessSpec::with_defaults()`. Can be overridden per-child.
    pub backoff: BackoffPolicy,
}

impl Config {
    /// Returns the SIGKILL escalation timeout as an `Option`.
    ///
    /// - `None` → never force-kill, wait for SIGTERM to be honored
    /// - `Some(d)` → SIGKILL after `d`
    #[inline]
    pub fn kill_escalation_timeout(&self) -> Option<Duration> {
        if self.kill_escalation == Duration::ZERO {
            None
        } else {
            Some(self.kill_escalation)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s` (reasonable graceful shutdown window)
    /// - `term_grace = 3s` (SIGTERM-to-wakeup delay)
    /// - `signal_arm_delay = 1s` (avoid racing monitor startup)
    /// - `kill_escalation = 10s` (SIGKILL stuck children)
    /// - `bus_capacity = 1024` (good baseline)
    /// - `respawn = RespawnPolicy::OnFailure` (relaunch crashed children)
    /// - `backoff = BackoffPolicy::default()` (exponential, 100ms..30s)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            term_grace: Duration::from_secs(3),
            signal_arm_delay: Duration::from_secs(1),
            kill_escalation: Duration::from_secs(10),
            bus_capacity: 1024,
            respawn: RespawnPolicy::default(),
            backoff: BackoffPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_escalation_means_no_forced_kill() {
        let mut cfg = Config::default();
        cfg.kill_escalation = Duration::ZERO;
        assert_eq!(cfg.kill_escalation_timeout(), None);

        cfg.kill_escalation = Duration::from_secs(5);
        assert_eq!(cfg.kill_escalation_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let mut cfg = Config::default();
        cfg.bus_capacity = 0;
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
