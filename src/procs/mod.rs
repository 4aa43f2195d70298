//! Declarative descriptors for managed child processes.
//!
//! - [`ProcessSpec`]: what to launch, as whom, where its output goes, and
//!   how it is respawned. Immutable once queued.
//! - [`RunAs`]: the uid/gid pair a child drops to before exec.

mod spec;

pub use spec::{ProcessSpec, RunAs};
