//! Observer fan-out for runtime events.
//!
//! The engine itself writes nothing except child stdout/stderr passthrough;
//! all diagnostics flow through [`Subscribe`] implementations attached at
//! build time. [`SubscriberSet`] delivers events to each subscriber through
//! a bounded queue with panic isolation.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
