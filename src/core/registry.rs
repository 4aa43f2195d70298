//! # Handle registry - event-driven lifecycle manager for managed children.
//!
//! The registry subscribes to Bus events and manages active handles:
//! - `ProcAddRequested` → spawns an actor and registers the handle
//! - `ProcRemoveRequested` → cancels and removes the handle
//! - `ActorExhausted` / `ActorDead` → auto-cleanup of finished handles
//! - `WakeupRequested` → immediately reaps actors that already finished
//!
//! ## Architecture
//! ```text
//! Bus → Registry.spawn_listener()
//!         ├─► ProcAddRequested(spec)  → spawn_and_register(spec)
//!         ├─► ProcRemoveRequested     → remove(name)
//!         ├─► WakeupRequested         → reap_finished()
//!         ├─► ActorExhausted(name)    → cleanup(name)
//!         └─► ActorDead(name)         → cleanup(name)
//! ```
//!
//! ## Rules
//! - The registry owns the handles (JoinHandle + CancellationToken).
//! - Actor spawning happens inside the registry (not in the monitor).
//! - Cleanup is automatic via events; `wakeup` only accelerates it.
//! - Bulk operations snapshot the map before iterating so they never hold
//!   the lock across awaits or race respawn mutations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::actor::{ActorExitReason, ProcActor, ProcActorParams};
use crate::events::{Bus, Event, EventKind};
use crate::procs::ProcessSpec;

/// Handle to a running process actor.
struct Handle {
    /// Original descriptor (kept for introspection).
    #[allow(dead_code)]
    spec: ProcessSpec,
    /// Join handle for the actor's run loop.
    join: JoinHandle<ActorExitReason>,
    /// Individual cancellation token for this handle.
    cancel: CancellationToken,
}

/// Event-driven registry of active handles.
pub struct Registry {
    procs: RwLock<HashMap<String, Handle>>,
    bus: Bus,
    runtime_token: CancellationToken,
    kill_escalation: Option<Duration>,
}

impl Registry {
    /// Creates a new registry.
    pub fn new(
        bus: Bus,
        runtime_token: CancellationToken,
        kill_escalation: Option<Duration>,
    ) -> Arc<Self> {
        Arc::new(Self {
            procs: RwLock::new(HashMap::new()),
            bus,
            runtime_token,
            kill_escalation,
        })
    }

    /// Spawns the event listener that manages handle lifecycle.
    ///
    /// Call once during monitor startup. The listener exits on runtime
    /// cancellation; draining the handles is the monitor's job (it owns the
    /// grace accounting).
    pub fn spawn_listener(self: Arc<Self>) {
        let mut rx = self.bus.subscribe();
        let rt = self.runtime_token.clone();
        let me = self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rt.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => me.handle_event(&ev).await,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                            // Lost management events; reap what we can see.
                            me.reap_finished().await;
                            continue;
                        }
                    }
                }
            }
        });
    }

    /// Dispatches one bus event.
    async fn handle_event(&self, event: &Event) {
        match event.kind {
            EventKind::ProcAddRequested => {
                if let Some(spec) = &event.spec {
                    self.spawn_and_register(spec.clone()).await;
                }
            }
            EventKind::ProcRemoveRequested => {
                if let Some(name) = &event.proc {
                    self.remove(name).await;
                }
            }
            EventKind::WakeupRequested => {
                self.reap_finished().await;
            }
            EventKind::ActorExhausted | EventKind::ActorDead => {
                if let Some(name) = &event.proc {
                    self.cleanup(name).await;
                }
            }
            _ => {}
        }
    }

    /// Returns a sorted list of active handle names.
    pub async fn list(&self) -> Vec<String> {
        let procs = self.procs.read().await;
        let mut names: Vec<String> = procs.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// True if no handles are under supervision.
    pub async fn is_empty(&self) -> bool {
        self.procs.read().await.is_empty()
    }

    /// Cancels all handles: cancel → join → `ProcRemoved` for each.
    ///
    /// Used at shutdown; the monitor bounds this with the grace timeout.
    pub async fn cancel_all(&self) {
        let handles: Vec<(String, Handle)> = {
            let mut procs = self.procs.write().await;
            procs.drain().collect()
        };

        for (_, h) in &handles {
            h.cancel.cancel();
        }

        for (name, h) in handles {
            self.join_and_report(&name, h.join).await;
        }
    }

    /// Reaps handles whose actors already finished.
    ///
    /// This is the deferred wakeup's re-evaluation: it reconciles whatever
    /// state exists right now and does not force anything still running.
    pub async fn reap_finished(&self) {
        let finished: Vec<String> = {
            let procs = self.procs.read().await;
            procs
                .iter()
                .filter(|(_, h)| h.join.is_finished())
                .map(|(name, _)| name.clone())
                .collect()
        };

        for name in finished {
            self.cleanup(&name).await;
        }
    }

    /// Spawns an actor and registers its handle.
    async fn spawn_and_register(&self, spec: ProcessSpec) {
        let name = spec.name().to_string();

        {
            let procs = self.procs.read().await;
            if procs.contains_key(&name) {
                self.bus.publish(
                    Event::now(EventKind::ProcFailed)
                        .with_proc(name.as_str())
                        .with_reason("proc_already_exists"),
                );
                return;
            }
        }

        let proc_token = self.runtime_token.child_token();
        let actor = ProcActor::new(
            self.bus.clone(),
            spec.clone(),
            ProcActorParams {
                respawn: spec.respawn(),
                backoff: spec.backoff(),
                kill_escalation: self.kill_escalation,
            },
        );

        let actor_token = proc_token.clone();
        let join = tokio::spawn(async move { actor.run(actor_token).await });

        let handle = Handle {
            spec,
            join,
            cancel: proc_token,
        };

        let mut procs = self.procs.write().await;
        if procs.contains_key(&name) {
            drop(procs);
            // Lost the insert race; cancel the actor we just spawned and
            // keep the incumbent handle untouched.
            handle.cancel.cancel();
            self.bus.publish(
                Event::now(EventKind::ProcFailed)
                    .with_proc(name.as_str())
                    .with_reason("proc_already_exists_race"),
            );
        } else {
            procs.insert(name.clone(), handle);
            drop(procs);
            self.bus
                .publish(Event::now(EventKind::ProcAdded).with_proc(name.as_str()));
        }
    }

    /// Removes a handle, cancelling its supervision.
    async fn remove(&self, name: &str) {
        if let Some(handle) = self.take_handle(name).await {
            handle.cancel.cancel();
            self.join_and_report(name, handle.join).await;
        } else {
            self.bus.publish(
                Event::now(EventKind::ProcFailed)
                    .with_proc(name)
                    .with_reason("proc_not_found"),
            );
        }
    }

    /// Cleanup of a finished handle (on `ActorExhausted`/`ActorDead`/reap).
    async fn cleanup(&self, name: &str) {
        if let Some(handle) = self.take_handle(name).await {
            self.join_and_report(name, handle.join).await;
        }
    }

    /// Atomically removes a handle from the registry.
    async fn take_handle(&self, name: &str) -> Option<Handle> {
        let mut procs = self.procs.write().await;
        procs.remove(name)
    }

    /// Awaits the join, reports a panic as `ActorDead`, always emits
    /// `ProcRemoved`.
    async fn join_and_report(&self, name: &str, join: JoinHandle<ActorExitReason>) {
        if join.await.is_err() {
            self.bus.publish(
                Event::now(EventKind::ActorDead)
                    .with_proc(name)
                    .with_reason("actor_panic"),
            );
        }
        self.bus
            .publish(Event::now(EventKind::ProcRemoved).with_proc(name));
    }
}
