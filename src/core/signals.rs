//! # Signal translation: OS signals → supervision actions.
//!
//! Two concerns live here:
//!
//! - [`wait_for_shutdown_signal`]: an async helper that completes when the
//!   process receives a termination signal (SIGINT/SIGTERM/SIGQUIT, plus
//!   `ctrl_c` as a fallback; `ctrl_c` only on non-Unix). The monitor turns
//!   its completion into `ShutdownRequested` + runtime cancellation.
//! - [`SignalTranslator`]: the SIGHUP handler. On SIGHUP it snapshots the
//!   live pids, delivers SIGTERM to each (fire-and-forget), and after the
//!   configured grace delay publishes a deferred `WakeupRequested` so the
//!   registry reconciles whatever state exists then — children may have
//!   exited and respawned, or may still be running; nothing is force-killed
//!   on this path.
//!
//! ## Reentrancy
//! Raw signal handlers never mutate supervision state: tokio resolves
//! signals into stream items on the event loop, and every state change here
//! happens as ordinary async code or as a published event consumed by the
//! single registry listener.
//!
//! ## Arming
//! The translator arms itself only after [`Config::signal_arm_delay`]
//! (crate::Config) so installation never races the monitor's own startup
//! sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::tracker::ProcTracker;
use crate::events::{Bus, Event, EventKind};

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners. Returns `Ok(())` when
/// any signal is received, or `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// On non-Unix platforms only `ctrl_c` is awaited.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Translates SIGHUP into graceful bulk termination plus a deferred wakeup.
pub struct SignalTranslator {
    arm_delay: Duration,
    term_grace: Duration,
}

impl SignalTranslator {
    /// Creates a translator from the global config.
    pub fn new(cfg: &Config) -> Self {
        Self {
            arm_delay: cfg.signal_arm_delay,
            term_grace: cfg.term_grace,
        }
    }

    /// Installs the SIGHUP disposition on the event loop.
    ///
    /// The returned task runs until `token` is cancelled. Each SIGHUP:
    /// 1. snapshots live `(name, pid)` pairs from the tracker,
    /// 2. sends SIGTERM to each pid (fire-and-forget),
    /// 3. publishes `TermRequested`,
    /// 4. after `term_grace`, publishes `WakeupRequested`.
    #[cfg(unix)]
    pub fn install(
        self,
        bus: Bus,
        tracker: Arc<ProcTracker>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        use tokio::signal::unix::{signal, SignalKind};

        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(self.arm_delay) => {}
                _ = token.cancelled() => return,
            }

            let mut sighup = match signal(SignalKind::hangup()) {
                Ok(s) => s,
                Err(_) => return,
            };

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    sig = sighup.recv() => {
                        if sig.is_none() {
                            break;
                        }

                        let live = tracker.live_pids();
                        for (_, pid) in &live {
                            let _ = kill(Pid::from_raw(*pid as i32), Signal::SIGTERM);
                        }
                        bus.publish(
                            Event::now(EventKind::TermRequested)
                                .with_reason(format!("children={}", live.len())),
                        );

                        tokio::select! {
                            _ = time::sleep(self.term_grace) => {
                                bus.publish(Event::now(EventKind::WakeupRequested));
                            }
                            _ = token.cancelled() => break,
                        }
                    }
                }
            }
        })
    }

    /// No SIGHUP on non-Unix platforms; the disposition is a no-op.
    #[cfg(not(unix))]
    pub fn install(
        self,
        _bus: Bus,
        _tracker: Arc<ProcTracker>,
        _token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async {})
    }
}
