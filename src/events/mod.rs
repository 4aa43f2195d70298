//! Runtime events and the broadcast bus that carries them.
//!
//! - [`Event`] / [`EventKind`]: structured lifecycle events with global
//!   sequence numbers for ordering.
//! - [`Bus`]: thin wrapper over `tokio::sync::broadcast` used by actors,
//!   the runner, the registry, and the monitor to publish events.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
