//! # Subscribe: the observer seam for runtime events.
//!
//! Implement [`Subscribe`] to receive every [`Event`] the runtime publishes
//! — lifecycle, respawns, shutdown accounting. Typical implementations are
//! structured loggers, metrics emitters, or alerting hooks.
//!
//! Each subscriber gets its own bounded queue and worker; a slow subscriber
//! drops its own events without affecting others (see
//! [`SubscriberSet`](super::SubscriberSet)).

use async_trait::async_trait;

use crate::events::Event;

/// Asynchronous observer of runtime events.
///
/// ## Example
/// ```rust
/// use async_trait::async_trait;
/// use procvisor::{Event, EventKind, Subscribe};
///
/// struct CrashCounter;
///
/// #[async_trait]
/// impl Subscribe for CrashCounter {
///     fn name(&self) -> &'static str { "crash-counter" }
///
///     async fn on_event(&self, ev: &Event) {
///         if ev.kind == EventKind::ProcFailed {
///             // increment a metric...
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Stable subscriber name, used in overflow/panic diagnostics.
    fn name(&self) -> &'static str;

    /// Handles one event. Must not block the worker for long; slow
    /// processing causes this subscriber's queue to overflow.
    async fn on_event(&self, ev: &Event);

    /// Capacity of this subscriber's event queue (min 1).
    fn queue_capacity(&self) -> usize {
        256
    }
}
