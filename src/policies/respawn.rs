//! # Respawn policies for process actors.
//!
//! [`RespawnPolicy`] determines whether a child is relaunched after its OS
//! process exits.
//!
//! - [`RespawnPolicy::Never`] — the child runs once and is never relaunched.
//! - [`RespawnPolicy::Always`] — the child is relaunched unconditionally,
//!   clean exit or crash.
//! - [`RespawnPolicy::OnFailure`] — the child is relaunched only after a
//!   failed exit (default).
//!
//! ## Choosing the right policy
//!
//! **One-shot jobs** (run once, exit):
//! ```text
//! RespawnPolicy::Never      → child runs once, handle goes terminal
//! ```
//!
//! **Long-running daemons** (must stay up unattended):
//! ```text
//! RespawnPolicy::Always     → any exit → relaunch (a clean exit of a
//!                             daemon is still a daemon that is down)
//! RespawnPolicy::OnFailure  → crash → relaunch with backoff;
//!                             clean exit → terminal
//! ```

/// When to relaunch a managed child after its process exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RespawnPolicy {
    /// Run once; never relaunch.
    Never,

    /// Relaunch after every exit, clean or failed.
    ///
    /// Failure-driven relaunches are delayed per [`BackoffPolicy`]
    /// (crate::policies::BackoffPolicy); clean exits relaunch promptly.
    Always,

    /// Relaunch only after a failed exit (non-zero code, signal death,
    /// or launch failure).
    #[default]
    OnFailure,
}

impl RespawnPolicy {
    /// True if a **clean** exit should lead to a relaunch.
    #[inline]
    pub fn respawn_on_success(&self) -> bool {
        matches!(self, RespawnPolicy::Always)
    }

    /// True if a **failed** exit should lead to a relaunch.
    #[inline]
    pub fn respawn_on_failure(&self) -> bool {
        matches!(self, RespawnPolicy::Always | RespawnPolicy::OnFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_matrix() {
        assert!(!RespawnPolicy::Never.respawn_on_success());
        assert!(!RespawnPolicy::Never.respawn_on_failure());

        assert!(RespawnPolicy::Always.respawn_on_success());
        assert!(RespawnPolicy::Always.respawn_on_failure());

        assert!(!RespawnPolicy::OnFailure.respawn_on_success());
        assert!(RespawnPolicy::OnFailure.respawn_on_failure());
    }
}
