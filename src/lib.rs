//! # procvisor
//!
//! **Procvisor** is a single-instance OS process supervisor for Rust.
//!
//! It launches designated worker executables, keeps them alive across
//! crashes, coordinates shutdown on external signals, and prevents
//! duplicate supervisor instances from running concurrently on the same
//! host via an on-disk lock directory. It is the operational backbone for
//! long-running daemons that must stay up unattended.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ ProcessSpec  │   │ ProcessSpec  │   │ ProcessSpec  │
//!     │ (child #1)   │   │ (child #2)   │   │ (child #3)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Monitor (runtime orchestrator)                                   │
//! │  - Bus (broadcast events)                                         │
//! │  - ProcTracker (handle states + live pid ledger, seq-ordered)     │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - Registry (manages active handles by name)                      │
//! │  - SignalTranslator (SIGHUP → SIGTERM children + deferred wakeup) │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  ProcActor   │   │  ProcActor   │   │  ProcActor   │
//!     │(respawn loop)│   │(respawn loop)│   │(respawn loop)│
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      ▼                  ▼                  ▼
//!   OS process         OS process         OS process
//!   (stdout/stderr ──► per-child log sink, verbatim)
//! ```
//!
//! ### Lifecycle
//! ```text
//! reconcile(lockdir) ──► LockRegistry::claim ──► Monitor::run(specs)
//!
//! per handle:
//!   Queued → Starting → Running → (Exited → Respawning → Starting)* → Stopped
//!
//! actor loop {
//!   ├─► attempt += 1
//!   ├─► publish ProcStarting{ proc, attempt }
//!   ├─► run_once: spawn → ProcStarted{pid} → wait
//!   │       ├─ exit 0  ──► ProcStopped
//!   │       │             ├─ RespawnPolicy::Never     ─► ActorExhausted, exit
//!   │       │             ├─ RespawnPolicy::OnFailure ─► ActorExhausted, exit
//!   │       │             └─ RespawnPolicy::Always    ─► continue
//!   │       └─ crash   ──► ProcFailed{ exit_code }
//!   │                     ├─ RespawnPolicy::Never ─► ActorExhausted, exit
//!   │                     └─ OnFailure/Always:
//!   │                          ├─► delay = backoff.next(attempt)
//!   │                          ├─► publish RespawnScheduled{ delay }
//!   │                          ├─► sleep(delay) (cancellable)
//!   │                          └─► continue
//!   └─ exit conditions: runtime token cancelled, policy exhausted
//! }
//!
//! on SIGHUP:  SIGTERM every live pid → sleep(term_grace) → wakeup()
//! on SIGTERM: ShutdownRequested → cancel actors → drain within grace
//! on exit:    LockRecord drop releases the pid marker (best-effort)
//! ```
//!
//! ## Features
//! | Area             | Description                                              | Key types / traits                       |
//! |------------------|----------------------------------------------------------|------------------------------------------|
//! | **Singleton**    | One supervisor per identity via pid markers.             | [`LockRegistry`], [`LockRecord`]         |
//! | **Reconciliation** | Startup cleanup of stale markers.                      | [`reconcile`], [`ReconcileOutcome`]      |
//! | **Supervision**  | Queue, launch, observe, respawn child processes.         | [`Monitor`], [`ProcessSpec`]             |
//! | **Policies**     | Respawn/backoff/jitter strategies per child.             | [`RespawnPolicy`], [`BackoffPolicy`]     |
//! | **Signals**      | SIGHUP terminate-and-wake, graceful shutdown.            | [`Config`] (`term_grace`, `signal_arm_delay`) |
//! | **Observability**| Hook into lifecycle events (logging, metrics).           | [`Subscribe`], [`Event`], [`EventKind`]  |
//! | **Errors**       | Typed errors for runtime and per-child failures.         | [`RuntimeError`], [`ProcError`]          |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```no_run
//! use procvisor::{reconcile, Config, LockRegistry, Monitor, ProcessSpec, RespawnPolicy};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let identity = "apache_exporter_mon";
//!
//!     // Reclaim stale state from a previous unclean shutdown, then make
//!     // sure we are the only instance.
//!     let outcome = reconcile("/run/lock/procvisor", "*.pid", identity)?;
//!     eprintln!("reconciled {} stale marker(s)", outcome.removed);
//!     let _lock = LockRegistry::claim("/run/lock/procvisor", identity)?;
//!
//!     let exporter = ProcessSpec::with_defaults("/usr/bin/apache_exporter", &cfg)
//!         .with_respawn(RespawnPolicy::Always)
//!         .with_log_path("/var/log/procvisor/apache_exporter.log");
//!
//!     let monitor = Monitor::builder(cfg).build();
//!     monitor.run(vec![exporter]).await?;
//!     // `_lock` drops here: the pid marker is released on every exit path.
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod lock;
mod policies;
mod procs;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{Monitor, MonitorBuilder, ProcStatus};
pub use error::{ProcError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use lock::{reconcile, LockRecord, LockRegistry, ReconcileOutcome};
pub use policies::{BackoffPolicy, JitterPolicy, RespawnPolicy};
pub use procs::{ProcessSpec, RunAs};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
