//! Runtime core: supervision engine and lifecycle.
//!
//! This module contains the embedded implementation of the procvisor
//! runtime. The public API from this module is [`Monitor`] (with its
//! [`MonitorBuilder`]) and the [`ProcStatus`] state machine, which together
//! queue, launch, observe, and respawn managed child processes.
//!
//! Internal modules:
//! - [`runner`]: executes one launch attempt with SIGTERM/SIGKILL
//!   escalation on cancellation and event publishing;
//! - [`actor`]: supervises a single child with respawn policy and backoff;
//! - [`registry`]: event-driven handle map (add/remove/reap);
//! - [`tracker`]: seq-ordered per-handle state machine and pid ledger;
//! - [`monitor`]: orchestrates the above, drives shutdown and grace;
//! - [`signals`]: signal translation (SIGHUP → terminate-and-wake,
//!   termination signals → graceful shutdown).

mod actor;
mod builder;
mod monitor;
mod registry;
mod runner;
mod signals;
mod tracker;

pub use builder::MonitorBuilder;
pub use monitor::Monitor;
pub use tracker::ProcStatus;

pub(crate) use tracker::ProcTracker;
