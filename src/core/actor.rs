//! # ProcActor: single-child supervisor.
//!
//! Supervises launches of one [`ProcessSpec`] with policies:
//! - relaunches per [`RespawnPolicy`](crate::policies::RespawnPolicy),
//! - failure delays per [`BackoffPolicy`](crate::policies::BackoffPolicy),
//! - cooperative cancellation via [`CancellationToken`].
//!
//! ## Event flow
//! For each attempt, the actor (and its runner) publish:
//! ```text
//! ProcStarting → [spawn + wait] → ProcStopped  (clean exit)
//!                               → ProcFailed   (crash / launch failure)
//!
//! If relaunch scheduled:
//!   → RespawnScheduled → [sleep] → (next attempt)
//!
//! On terminal exit:
//!   → ActorExhausted (policy forbids relaunch)
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially** within one actor (never parallel).
//! - The attempt counter **increments on each launch** (monotonic, never
//!   resets), so backoff grows across a crash loop.
//! - Cancellation is honored at safe points: before each launch and during
//!   the backoff sleep; mid-attempt cancellation is handled by the runner's
//!   graceful stop.
//! - A respawn-eligible handle is never silently dropped: every exit either
//!   schedules a relaunch or publishes a terminal actor event.

use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::core::runner::run_once;
use crate::error::ProcError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffPolicy, RespawnPolicy};
use crate::procs::ProcessSpec;

/// Why an actor's run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorExitReason {
    /// The respawn policy forbade further relaunches.
    Exhausted,
    /// Supervision was cancelled (shutdown or explicit removal).
    Cancelled,
}

/// Configuration parameters for a process actor.
///
/// Extracted from a [`ProcessSpec`] and the global config by the registry
/// when spawning actors.
#[derive(Clone)]
pub struct ProcActorParams {
    /// When to relaunch the child.
    pub respawn: RespawnPolicy,
    /// How to compute failure-driven relaunch delays.
    pub backoff: BackoffPolicy,
    /// SIGKILL escalation timeout for cancelled attempts.
    pub kill_escalation: Option<Duration>,
}

/// Supervises launches of a single child with respawn, backoff, and event
/// publishing.
pub struct ProcActor {
    /// Descriptor of the child to launch.
    pub spec: ProcessSpec,
    /// Parameters governing relaunch behavior.
    pub params: ProcActorParams,
    /// Internal event bus (used to publish lifecycle events).
    pub bus: Bus,
}

impl ProcActor {
    /// Creates a new process actor.
    pub fn new(bus: Bus, spec: ProcessSpec, params: ProcActorParams) -> Self {
        Self { spec, params, bus }
    }

    /// Runs the actor until policy exhaustion or cancellation.
    ///
    /// This is the main actor loop. It will:
    /// 1. Publish `ProcStarting`
    /// 2. Execute one attempt via `run_once`
    /// 3. Apply the respawn policy
    /// 4. If relaunching after failure, publish `RespawnScheduled` and
    ///    sleep the backoff delay (cancellable)
    /// 5. Repeat until an exit condition
    ///
    /// ### Exit conditions
    /// - Clean exit and the policy forbids relaunch → `Exhausted`
    /// - Failed exit and the policy forbids relaunch → `Exhausted`
    /// - `runtime_token` cancelled (shutdown or removal) → `Cancelled`
    pub async fn run(self, runtime_token: CancellationToken) -> ActorExitReason {
        let mut attempt: u32 = 0;

        loop {
            if runtime_token.is_cancelled() {
                return ActorExitReason::Cancelled;
            }

            attempt += 1;
            self.bus.publish(
                Event::now(EventKind::ProcStarting)
                    .with_proc(self.spec.name())
                    .with_attempt(attempt),
            );

            let res = run_once(
                &self.spec,
                &runtime_token,
                attempt,
                self.params.kill_escalation,
                &self.bus,
            )
            .await;

            match res {
                Ok(()) => {
                    if self.params.respawn.respawn_on_success() {
                        continue;
                    }
                    return self.exhausted(attempt);
                }
                Err(ProcError::Canceled) => {
                    return ActorExitReason::Cancelled;
                }
                Err(e) => {
                    if !(self.params.respawn.respawn_on_failure() && e.is_respawnable()) {
                        return self.exhausted(attempt);
                    }

                    let delay = self.params.backoff.next(attempt - 1);
                    self.bus.publish(
                        Event::now(EventKind::RespawnScheduled)
                            .with_proc(self.spec.name())
                            .with_delay(delay)
                            .with_attempt(attempt)
                            .with_reason(e.to_string()),
                    );

                    let sleep = time::sleep(delay);
                    tokio::pin!(sleep);
                    select! {
                        _ = &mut sleep => {}
                        _ = runtime_token.cancelled() => {
                            return ActorExitReason::Cancelled;
                        }
                    }
                }
            }
        }
    }

    /// Publishes the terminal event and reports exhaustion.
    fn exhausted(&self, attempt: u32) -> ActorExitReason {
        self.bus.publish(
            Event::now(EventKind::ActorExhausted)
                .with_proc(self.spec.name())
                .with_attempt(attempt),
        );
        ActorExitReason::Exhausted
    }
}
