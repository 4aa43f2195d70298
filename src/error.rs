//! Error types used by the procvisor runtime and managed processes.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the supervision runtime itself
//!   (singleton lock conflicts, shutdown grace violations).
//! - [`ProcError`] — errors raised by individual child process executions.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics, and [`ProcError::is_respawnable`] drives the respawn
//! state machine.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the supervision runtime.
///
/// Startup-fatal conditions (`AlreadyRunning`, `LockUnavailable`) abort the
/// whole process before any child is touched. `GraceExceeded` is returned
/// from a shutdown that left stuck children behind.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A live lock marker already exists for this identity.
    ///
    /// `pid` is `None` when the marker could not be read and was
    /// conservatively treated as live.
    #[error("supervisor '{identity}' already running (pid {pid:?})")]
    AlreadyRunning {
        /// Program identity the lock is scoped to.
        identity: String,
        /// Owning pid recorded in the marker, if readable.
        pid: Option<u32>,
    },

    /// The lock directory could not be created or the marker written.
    #[error("lock directory unusable for '{identity}': {source}")]
    LockUnavailable {
        /// Program identity the claim was for.
        identity: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// Shutdown grace period was exceeded; some children remained stuck.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of children that did not shut down in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyRunning { .. } => "runtime_already_running",
            RuntimeError::LockUnavailable { .. } => "runtime_lock_unavailable",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::AlreadyRunning { identity, pid } => {
                format!("already running: identity={identity} pid={pid:?}")
            }
            RuntimeError::LockUnavailable { identity, source } => {
                format!("lock unavailable: identity={identity} error={source}")
            }
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck children={stuck:?}")
            }
        }
    }

    /// True for conditions that must abort startup before children launch.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::AlreadyRunning { .. } | RuntimeError::LockUnavailable { .. }
        )
    }
}

/// # Errors produced by one launch attempt of a managed child.
///
/// These are local to a single handle and never terminate the supervisor:
/// a respawn-eligible child is retried on the normal respawn path.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcError {
    /// The OS refused to start the child (bad path, permission denied).
    #[error("launch failed: {error}")]
    Launch {
        /// The underlying spawn error message.
        error: String,
    },

    /// The child exited with a non-zero status code.
    #[error("exited with code {code}")]
    Exited {
        /// Exit code reported by the OS.
        code: i32,
    },

    /// The child was killed by an OS signal before exiting.
    #[error("terminated by signal {signal}")]
    Signaled {
        /// Signal number that terminated the child.
        signal: i32,
    },

    /// The attempt was cancelled due to supervisor shutdown.
    #[error("supervision cancelled")]
    Canceled,
}

impl ProcError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcError::Launch { .. } => "proc_launch_failed",
            ProcError::Exited { .. } => "proc_exited",
            ProcError::Signaled { .. } => "proc_signaled",
            ProcError::Canceled => "proc_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ProcError::Launch { error } => format!("launch: {error}"),
            ProcError::Exited { code } => format!("exit code: {code}"),
            ProcError::Signaled { signal } => format!("signal: {signal}"),
            ProcError::Canceled => "supervision cancelled".to_string(),
        }
    }

    /// Indicates whether the failure is eligible for the respawn path.
    ///
    /// Returns `true` for every failure except [`ProcError::Canceled`]:
    /// launch failures, crashes, and signal deaths are all retried when the
    /// descriptor's respawn policy allows it.
    pub fn is_respawnable(&self) -> bool {
        !matches!(self, ProcError::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let err = RuntimeError::AlreadyRunning {
            identity: "svc".into(),
            pid: Some(42),
        };
        assert_eq!(err.as_label(), "runtime_already_running");
        assert!(err.is_startup_fatal());

        let err = RuntimeError::GraceExceeded {
            grace: Duration::from_secs(5),
            stuck: vec![],
        };
        assert!(!err.is_startup_fatal());
    }

    #[test]
    fn cancellation_is_not_respawnable() {
        assert!(ProcError::Exited { code: 1 }.is_respawnable());
        assert!(ProcError::Launch { error: "enoent".into() }.is_respawnable());
        assert!(ProcError::Signaled { signal: 9 }.is_respawnable());
        assert!(!ProcError::Canceled.is_respawnable());
    }
}
