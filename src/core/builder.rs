use std::sync::Arc;

use tokio::runtime::Handle;

use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::config::Config;
use super::controller::{Engine, TransactionController};

/// Builder for constructing a [`TransactionController`] with optional subscribers.
pub struct TransactionControllerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl TransactionControllerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive engine events (task lifecycle, problems, service
    /// transitions) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the controller.
    ///
    /// Captures the current Tokio runtime; task bodies and subscriber workers run
    /// on it. Must be called from within a Tokio runtime.
    pub fn build(self) -> TransactionController {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let engine = Arc::new(Engine::new(self.cfg, bus, Handle::current()));
        TransactionController::from_parts(engine, subs)
    }
}
