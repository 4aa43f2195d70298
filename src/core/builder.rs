//! Builder wiring for the [`Monitor`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::registry::Registry;
use crate::core::tracker::ProcTracker;
use crate::core::Monitor;
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`Monitor`] with optional subscribers.
pub struct MonitorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl MonitorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (child lifecycle, respawns,
    /// shutdown accounting) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds and returns the monitor instance.
    ///
    /// Must be called within a tokio runtime: subscriber workers are
    /// spawned here.
    pub fn build(self) -> Arc<Monitor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let runtime_token = CancellationToken::new();
        let tracker = Arc::new(ProcTracker::new());
        let registry = Registry::new(
            bus.clone(),
            runtime_token.clone(),
            self.cfg.kill_escalation_timeout(),
        );

        Arc::new(Monitor::new_internal(
            self.cfg,
            bus,
            subs,
            tracker,
            registry,
            runtime_token,
        ))
    }
}
