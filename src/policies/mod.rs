//! Respawn and backoff policies applied per managed child.
//!
//! - [`RespawnPolicy`]: when to relaunch a child after it exits.
//! - [`BackoffPolicy`]: how failure-driven relaunch delays grow.
//! - [`JitterPolicy`]: randomization of those delays.

mod backoff;
mod jitter;
mod respawn;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use respawn::RespawnPolicy;
