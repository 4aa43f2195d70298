//! Singleton enforcement via an on-disk lock directory.
//!
//! - [`LockRegistry`] / [`LockRecord`]: claim and release a pid marker
//!   proving one supervisor instance owns a given identity.
//! - [`reconcile`]: startup-time cleanup of stale markers left behind by a
//!   previous, uncleanly terminated instance.
//!
//! The marker file is the mutual-exclusion primitive: filesystem presence,
//! not a true lock. Concurrent startup races are rare and are caught again
//! by `claim` after reconciliation.

mod reconcile;
mod registry;

pub use reconcile::{reconcile, ReconcileOutcome};
pub use registry::{LockRecord, LockRegistry};

/// Probes whether a process with `pid` is currently alive.
///
/// Uses the null-signal probe: `kill(pid, 0)`. `EPERM` means the process
/// exists but belongs to another user, which still counts as alive.
#[cfg(unix)]
pub(crate) fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true,
    }
}

#[cfg(not(unix))]
pub(crate) fn pid_alive(_pid: u32) -> bool {
    // No portable liveness probe; treat recorded pids as live so claim
    // stays conservative.
    true
}
