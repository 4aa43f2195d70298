//! # Monitor: orchestrates process actors, fan-out delivery, and shutdown.
//!
//! The [`Monitor`] owns the event bus, a `SubscriberSet`, the handle
//! [`Registry`](super::registry::Registry), the state
//! [`ProcTracker`](super::tracker::ProcTracker), and the global runtime
//! configuration. It queues descriptors, drives the supervision loop,
//! arms the signal translator, and enforces the shutdown grace window.
//!
//! ## High-level architecture
//! ```text
//! Inputs to run():
//!   Vec<ProcessSpec>  ──►  Monitor::run(initial)
//!
//! Startup order (guaranteed):
//!   1. subscriber/tracker/registry listeners attach to the Bus
//!   2. SignalTranslator::install() is scheduled (arms after arm_delay,
//!      strictly after run() started)
//!   3. queued + initial specs are published as ProcAddRequested
//!
//! Event flow:
//!   ProcActor/Runner ── publish(Event) ──► Bus ──┬─► SubscriberSet workers
//!                                               ├─► ProcTracker (state+pids)
//!                                               ├─► Registry (add/remove/reap)
//!                                               └─► Monitor drive loop
//!
//! Shutdown path:
//!   wait_for_shutdown_signal() / stop()
//!       └─► publish ShutdownRequested
//!       └─► runtime_token.cancel() → actors SIGTERM their children
//!       └─► drain_with_grace(cfg.grace):
//!              ├─ all handles joined → AllStoppedWithin, Ok(())
//!              └─ timeout            → GraceExceeded{stuck}, Err
//! ```
//!
//! ## Example
//! ```no_run
//! use procvisor::{Config, Monitor, ProcessSpec, RespawnPolicy};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let monitor = Monitor::builder(cfg.clone()).build();
//!
//!     let exporter = ProcessSpec::with_defaults("/usr/bin/apache_exporter", &cfg)
//!         .with_respawn(RespawnPolicy::Always)
//!         .with_log_path("/var/log/apache_exporter.log");
//!
//!     monitor.run(vec![exporter]).await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::registry::Registry;
use crate::core::signals::{wait_for_shutdown_signal, SignalTranslator};
use crate::core::tracker::{ProcStatus, ProcTracker};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::procs::ProcessSpec;
use crate::subscribers::SubscriberSet;

use super::builder::MonitorBuilder;

/// Coordinates process actors, event delivery, and graceful shutdown.
pub struct Monitor {
    /// Global runtime configuration.
    pub cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    tracker: Arc<ProcTracker>,
    registry: Arc<Registry>,
    runtime_token: CancellationToken,
    pending: Mutex<Vec<ProcessSpec>>,
    started: AtomicBool,
}

impl Monitor {
    /// Starts building a monitor with the given configuration.
    pub fn builder(cfg: Config) -> MonitorBuilder {
        MonitorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        tracker: Arc<ProcTracker>,
        registry: Arc<Registry>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            tracker,
            registry,
            runtime_token,
            pending: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Shared event bus; subscribe here to observe the runtime.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Current lifecycle state of a handle, if it was ever queued.
    pub fn status(&self, name: &str) -> Option<ProcStatus> {
        self.tracker.status(name)
    }

    /// Snapshot of `(name, pid)` for every child confirmed running.
    pub fn live_pids(&self) -> Vec<(String, u32)> {
        self.tracker.live_pids()
    }

    /// Registers a descriptor to be launched.
    ///
    /// Valid before or after [`run`](Self::run): before, the spec is held
    /// until startup; after, it is routed through the registry listener as
    /// an add-request.
    pub fn queue(&self, spec: ProcessSpec) {
        if self.started.load(Ordering::Acquire) {
            self.publish_add(spec);
        } else {
            self.pending.lock().expect("pending lock poisoned").push(spec);
        }
    }

    /// Requests removal of a handle from supervision (cancels its child).
    pub fn dequeue(&self, name: &str) {
        self.bus
            .publish(Event::now(EventKind::ProcRemoveRequested).with_proc(name));
    }

    /// Forces immediate re-evaluation of all handles instead of waiting
    /// for the next lifecycle event.
    pub fn wakeup(&self) {
        self.bus.publish(Event::now(EventKind::WakeupRequested));
    }

    /// Requests graceful stop of all supervision.
    ///
    /// Children receive SIGTERM via their actors' cancellation path; `run`
    /// then drains handles within the grace window.
    pub fn stop(&self) {
        self.runtime_token.cancel();
    }

    /// Runs the supervision loop until either:
    /// - every queued handle has drained on its own (one-shot workloads), or
    /// - a termination signal arrives / [`stop`](Self::stop) is called →
    ///   graceful shutdown (may end with `GraceExceeded`).
    ///
    /// With no queued descriptors the monitor idles until a signal, which
    /// is the normal daemon posture.
    pub async fn run(&self, initial: Vec<ProcessSpec>) -> Result<(), RuntimeError> {
        // Subscribe before anything is published so the drive loop misses
        // no management event.
        let rx = self.bus.subscribe();

        self.subscriber_listener();
        self.tracker
            .clone()
            .spawn_listener(self.bus.subscribe(), self.runtime_token.clone());
        self.registry.clone().spawn_listener();

        let _translator = SignalTranslator::new(&self.cfg).install(
            self.bus.clone(),
            Arc::clone(&self.tracker),
            self.runtime_token.clone(),
        );

        self.started.store(true, Ordering::Release);
        let queued: Vec<ProcessSpec> = {
            let mut pending = self.pending.lock().expect("pending lock poisoned");
            pending.drain(..).chain(initial).collect()
        };
        for spec in queued {
            self.publish_add(spec);
        }

        self.drive(rx).await
    }

    /// Publishes an add-request carrying the descriptor payload.
    fn publish_add(&self, spec: ProcessSpec) {
        self.bus.publish(
            Event::now(EventKind::ProcAddRequested)
                .with_proc(spec.name_arc())
                .with_spec(spec),
        );
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget).
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let token = self.runtime_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        });
    }

    /// Waits until the workload drains naturally or shutdown is requested.
    async fn drive(
        &self,
        mut rx: tokio::sync::broadcast::Receiver<Event>,
    ) -> Result<(), RuntimeError> {
        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);

        // Management-event accounting for natural completion: every add
        // request eventually resolves to ProcAdded (then ProcRemoved) or a
        // duplicate rejection.
        let mut active: HashSet<String> = HashSet::new();
        let mut pending_adds: usize = 0;
        let mut saw_add = false;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    self.bus.publish(Event::now(EventKind::ShutdownRequested));
                    self.runtime_token.cancel();
                    return self.drain_with_grace().await;
                }
                _ = self.runtime_token.cancelled() => {
                    return self.drain_with_grace().await;
                }
                msg = rx.recv() => match msg {
                    Ok(ev) => {
                        self.account(&ev, &mut active, &mut pending_adds, &mut saw_add);
                        if saw_add && pending_adds == 0 && active.is_empty() {
                            return Ok(());
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                        // Counters may have drifted; fall back to the
                        // registry's authoritative view.
                        if saw_add && self.registry.is_empty().await {
                            return Ok(());
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Applies one management event to the natural-completion accounting.
    fn account(
        &self,
        ev: &Event,
        active: &mut HashSet<String>,
        pending_adds: &mut usize,
        saw_add: &mut bool,
    ) {
        match ev.kind {
            EventKind::ProcAddRequested => {
                *saw_add = true;
                *pending_adds += 1;
            }
            EventKind::ProcAdded => {
                *pending_adds = pending_adds.saturating_sub(1);
                if let Some(name) = ev.proc.as_deref() {
                    active.insert(name.to_string());
                }
            }
            EventKind::ProcFailed => {
                // Duplicate-add rejections resolve a pending add request
                // without ever registering a handle.
                if matches!(
                    ev.reason.as_deref(),
                    Some("proc_already_exists") | Some("proc_already_exists_race")
                ) {
                    *pending_adds = pending_adds.saturating_sub(1);
                }
            }
            EventKind::ProcRemoved => {
                if let Some(name) = ev.proc.as_deref() {
                    active.remove(name);
                }
            }
            _ => {}
        }
    }

    /// Drains all handles within the configured grace period.
    ///
    /// Publishes `AllStoppedWithin` on success, or `GraceExceeded` on
    /// timeout together with the stuck-handle list from the tracker.
    async fn drain_with_grace(&self) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        match time::timeout(grace, self.registry.cancel_all()).await {
            Ok(()) => {
                self.bus.publish(Event::now(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::now(EventKind::GraceExceeded));
                Err(RuntimeError::GraceExceeded {
                    grace,
                    stuck: self.tracker.stuck(),
                })
            }
        }
    }
}
