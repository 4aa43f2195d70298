//! # Runtime events emitted by the monitor, registry, and process actors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: child execution flow (starting, started, stopped,
//!   failed, respawn scheduled)
//! - **Management events**: runtime handle control (add/remove requests and
//!   confirmations)
//! - **Terminal events**: actor final states (policy exhausted, dead)
//! - **Shutdown events**: signal translation and grace accounting
//!
//! The [`Event`] struct carries metadata such as timestamps, the child name,
//! the OS pid, exit codes, and respawn delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. The tracker uses `seq` to reject stale updates when events
//! are delivered out of order, which is what keeps the `os_pid` invariant:
//! a pid is cleared (via `ProcStopped`/`ProcFailed`) strictly before the
//! `RespawnScheduled` decision that follows it.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (termination signal observed).
    ShutdownRequested,

    /// SIGHUP observed: graceful termination requested for all live children.
    ///
    /// Sets:
    /// - `reason`: number of children signalled, as text
    TermRequested,

    /// Deferred wakeup: re-evaluate all handles now.
    WakeupRequested,

    /// All children stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some children did not stop in time.
    GraceExceeded,

    // === Child lifecycle events ===
    /// A launch attempt is starting.
    ///
    /// Sets:
    /// - `proc`: child name
    /// - `attempt`: attempt number (1-based, per actor)
    ProcStarting,

    /// The OS process spawned successfully and is confirmed alive.
    ///
    /// Sets:
    /// - `proc`: child name
    /// - `pid`: OS process id
    /// - `attempt`: attempt number
    ProcStarted,

    /// The child stopped cleanly (exit 0, or graceful cancellation).
    ///
    /// Sets:
    /// - `proc`: child name
    /// - `attempt`: attempt number
    ProcStopped,

    /// The attempt failed (launch error, crash, or signal death).
    ///
    /// Sets:
    /// - `proc`: child name
    /// - `attempt`: attempt number
    /// - `exit_code`: exit code, when the child got far enough to have one
    /// - `reason`: failure message
    ProcFailed,

    /// A relaunch of the same descriptor was scheduled.
    ///
    /// Sets:
    /// - `proc`: child name
    /// - `attempt`: previous attempt number
    /// - `delay_ms`: delay before the relaunch
    /// - `reason`: last failure message (failure-driven respawn only)
    RespawnScheduled,

    // === Runtime handle management events ===
    /// Request to queue a new descriptor under supervision.
    ProcAddRequested,

    /// Descriptor was queued (actor spawned and registered).
    ProcAdded,

    /// Request to dequeue a child from supervision.
    ProcRemoveRequested,

    /// Handle was removed from supervision (after join/cleanup).
    ProcRemoved,

    // === Actor terminal states ===
    /// Actor exhausted its respawn policy and will not relaunch.
    ///
    /// Emitted when:
    /// - `RespawnPolicy::Never` → child exited (any status)
    /// - `RespawnPolicy::OnFailure` → child exited cleanly
    ActorExhausted,

    /// Actor terminated because its supervision was cancelled mid-attempt
    /// or its task panicked.
    ActorDead,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the managed child, if applicable.
    pub proc: Option<Arc<str>>,
    /// OS pid, set only on `ProcStarted`.
    pub pid: Option<u32>,
    /// Exit code, set on `ProcFailed` when the child exited with one.
    pub exit_code: Option<i32>,
    /// Respawn delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,

    /// Internal descriptor payload (used only for `ProcAddRequested`).
    pub(crate) spec: Option<crate::procs::ProcessSpec>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            proc: None,
            pid: None,
            exit_code: None,
            delay_ms: None,
            attempt: None,
            reason: None,
            spec: None,
        }
    }

    /// Attaches a child name.
    #[inline]
    pub fn with_proc(mut self, proc: impl Into<Arc<str>>) -> Self {
        self.proc = Some(proc.into());
        self
    }

    /// Attaches an OS pid.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches a respawn delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_proc(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_proc(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub(crate) fn with_spec(mut self, spec: crate::procs::ProcessSpec) -> Self {
        self.spec = Some(spec);
        self
    }
}
