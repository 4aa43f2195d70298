//! # Handle state tracker with sequence-based ordering.
//!
//! Maintains the authoritative state of every managed handle, using event
//! sequence numbers to handle out-of-order delivery.
//!
//! ## Architecture
//! ```text
//! actors/runner ──► Bus ──► ProcTracker listener ──► update()
//!                                                       │
//!                                                       ▼
//!                                     HashMap<String, HandleState>
//!                                       (name → {seq, status, pid})
//! ```
//!
//! ## State machine per handle
//! ```text
//! Queued → Starting → Running → (Exited → Respawning → Starting)* → Stopped
//! ```
//!
//! ## Rules
//! - Events with `seq <= last_seq` are **rejected** (stale).
//! - `pid` is recorded only on `ProcStarted` and cleared on the terminal
//!   attempt event — a handle's pid is never observable after its process
//!   exit was confirmed, and always before the respawn decision lands.
//! - Read operations (`live_pids`, `stuck`, `status`) are eventually
//!   consistent snapshots.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;

use crate::events::{Event, EventKind};

/// Lifecycle state of one managed handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcStatus {
    /// Registered, not yet launching.
    Queued,
    /// A launch attempt is in flight.
    Starting,
    /// The OS process is confirmed alive.
    Running,
    /// The OS process exited; respawn decision pending or terminal.
    Exited,
    /// A relaunch is scheduled after a backoff delay.
    Respawning,
    /// Terminal: no further launches for this handle.
    Stopped,
}

/// Per-handle state for ordering validation.
#[derive(Debug, Clone)]
struct HandleState {
    /// Last seen sequence number for this handle.
    last_seq: u64,
    /// Current lifecycle state.
    status: ProcStatus,
    /// OS pid, present only while the process is confirmed alive.
    pid: Option<u32>,
}

/// Thread-safe tracker of managed handle states and live pids.
///
/// ### Responsibilities
/// - Provides the live-pid snapshot for signal-triggered bulk termination
/// - Provides the stuck-handle list for grace reporting
/// - Rejects stale events using sequence numbers
pub struct ProcTracker {
    state: RwLock<HashMap<String, HandleState>>,
}

impl ProcTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Updates handle state if the event is newer than the last seen.
    ///
    /// Returns `true` when the event changed the lifecycle state.
    ///
    /// ### Transitions
    /// - `ProcAdded` → `Queued`
    /// - `ProcStarting` → `Starting`
    /// - `ProcStarted` → `Running` (+pid)
    /// - `ProcStopped` / `ProcFailed` → `Exited` (pid cleared)
    /// - `RespawnScheduled` → `Respawning`
    /// - `ActorExhausted` / `ActorDead` / `ProcRemoved` → `Stopped`
    /// - Other events → seq update only
    pub fn update(&self, ev: &Event) -> bool {
        let name = match ev.proc.as_deref() {
            Some(n) => n,
            None => return false,
        };

        let mut state = self.state.write().expect("tracker lock poisoned");
        let entry = state.entry(name.to_string()).or_insert(HandleState {
            last_seq: 0,
            status: ProcStatus::Queued,
            pid: None,
        });

        if ev.seq <= entry.last_seq && entry.last_seq != 0 {
            return false;
        }
        entry.last_seq = ev.seq;

        match ev.kind {
            EventKind::ProcAdded => {
                entry.status = ProcStatus::Queued;
                true
            }
            EventKind::ProcStarting => {
                entry.status = ProcStatus::Starting;
                true
            }
            EventKind::ProcStarted => {
                entry.status = ProcStatus::Running;
                entry.pid = ev.pid;
                true
            }
            EventKind::ProcStopped | EventKind::ProcFailed => {
                entry.status = ProcStatus::Exited;
                entry.pid = None;
                true
            }
            EventKind::RespawnScheduled => {
                entry.status = ProcStatus::Respawning;
                true
            }
            EventKind::ActorExhausted | EventKind::ActorDead | EventKind::ProcRemoved => {
                entry.status = ProcStatus::Stopped;
                entry.pid = None;
                true
            }
            _ => false,
        }
    }

    /// Current status of a handle, if it was ever seen.
    pub fn status(&self, name: &str) -> Option<ProcStatus> {
        self.state
            .read()
            .expect("tracker lock poisoned")
            .get(name)
            .map(|s| s.status)
    }

    /// Snapshot of `(name, pid)` for every handle confirmed running.
    ///
    /// This is the set a signal-triggered bulk termination iterates over;
    /// snapshotting decouples it from concurrent respawn mutations.
    pub fn live_pids(&self) -> Vec<(String, u32)> {
        self.state
            .read()
            .expect("tracker lock poisoned")
            .iter()
            .filter_map(|(name, s)| s.pid.map(|pid| (name.clone(), pid)))
            .collect()
    }

    /// Names of handles that are not yet terminal, sorted for stable output.
    ///
    /// Used for `GraceExceeded` reporting at shutdown.
    pub fn stuck(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .read()
            .expect("tracker lock poisoned")
            .iter()
            .filter(|(_, s)| {
                matches!(
                    s.status,
                    ProcStatus::Starting | ProcStatus::Running | ProcStatus::Respawning
                )
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Spawns a listener that applies bus events to this tracker.
    ///
    /// Call once during monitor startup.
    pub fn spawn_listener(
        self: Arc<Self>,
        mut rx: tokio::sync::broadcast::Receiver<Event>,
        token: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => {
                            self.update(&ev);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        });
    }
}

impl Default for ProcTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(kind: EventKind, name: &str) -> Event {
        Event::now(kind).with_proc(name)
    }

    #[test]
    fn follows_the_state_machine() {
        let t = ProcTracker::new();

        t.update(&ev(EventKind::ProcAdded, "w"));
        assert_eq!(t.status("w"), Some(ProcStatus::Queued));

        t.update(&ev(EventKind::ProcStarting, "w"));
        assert_eq!(t.status("w"), Some(ProcStatus::Starting));

        t.update(&ev(EventKind::ProcStarted, "w").with_pid(4242));
        assert_eq!(t.status("w"), Some(ProcStatus::Running));
        assert_eq!(t.live_pids(), vec![("w".to_string(), 4242)]);

        t.update(&ev(EventKind::ProcFailed, "w"));
        assert_eq!(t.status("w"), Some(ProcStatus::Exited));
        assert!(t.live_pids().is_empty());

        t.update(&ev(EventKind::RespawnScheduled, "w"));
        assert_eq!(t.status("w"), Some(ProcStatus::Respawning));

        t.update(&ev(EventKind::ActorExhausted, "w"));
        assert_eq!(t.status("w"), Some(ProcStatus::Stopped));
    }

    #[test]
    fn rejects_stale_events() {
        let t = ProcTracker::new();
        let started = ev(EventKind::ProcStarted, "w").with_pid(7);
        let starting = ev(EventKind::ProcStarting, "w");
        // `starting` has the newer seq; apply it first, then replay the older.
        t.update(&starting);
        assert!(!t.update(&started));
        assert_eq!(t.status("w"), Some(ProcStatus::Starting));
        assert!(t.live_pids().is_empty());
    }

    #[test]
    fn pid_cleared_before_respawn_decision() {
        let t = ProcTracker::new();
        t.update(&ev(EventKind::ProcStarted, "w").with_pid(7));
        t.update(&ev(EventKind::ProcFailed, "w"));
        // Between exit confirmation and respawn, no pid is observable.
        assert!(t.live_pids().is_empty());
        t.update(&ev(EventKind::RespawnScheduled, "w"));
        assert!(t.live_pids().is_empty());
    }

    #[test]
    fn stuck_lists_non_terminal_handles() {
        let t = ProcTracker::new();
        t.update(&ev(EventKind::ProcStarted, "a").with_pid(1));
        t.update(&ev(EventKind::ProcStarted, "b").with_pid(2));
        t.update(&ev(EventKind::ProcStopped, "b"));
        t.update(&ev(EventKind::ActorExhausted, "b"));
        assert_eq!(t.stuck(), vec!["a".to_string()]);
    }
}
