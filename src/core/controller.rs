//! # TransactionController: the entry point of the engine.
//!
//! Owns the shared runtime pieces every transaction uses and hands out
//! transactions.
//!
//! ```text
//! TransactionController
//!   ├─ Engine (shared by all its transactions)
//!   │    ├─ Bus (broadcast events)
//!   │    ├─ Semaphore (optional global cap on running bodies)
//!   │    └─ runtime Handle (where bodies are spawned)
//!   └─ SubscriberSet (fed by the bus listener)
//!
//! create_update_transaction() ──► Transaction ──► submit / prepare / commit ...
//! ```
//!
//! ## Rules
//! - Facades (registries, controllers) accept only transactions whose
//!   `controller_id()` matches the controller they were created with.
//! - Bodies run on the Tokio runtime that was current when the controller was built.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio::runtime::Handle;
use tokio::sync::{Semaphore, broadcast};

use crate::events::{Bus, Event};
use crate::subscribers::SubscriberSet;

use super::builder::TransactionControllerBuilder;
use super::config::Config;
use super::transaction::{Transaction, TxnKind};

static CONTROLLER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Runtime pieces shared by a controller and all of its transactions.
pub(crate) struct Engine {
    pub(crate) id: u64,
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) semaphore: Option<Arc<Semaphore>>,
    pub(crate) runtime: Handle,
}

impl Engine {
    pub(crate) fn new(cfg: Config, bus: Bus, runtime: Handle) -> Self {
        let semaphore = cfg.concurrency_limit().map(Semaphore::new).map(Arc::new);
        Self {
            id: CONTROLLER_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            cfg,
            bus,
            semaphore,
            runtime,
        }
    }
}

/// Creates and owns transactions.
pub struct TransactionController {
    engine: Arc<Engine>,
    subs: Arc<SubscriberSet>,
}

impl TransactionController {
    /// Returns a builder; subscribers are optional.
    pub fn builder(cfg: Config) -> TransactionControllerBuilder {
        TransactionControllerBuilder::new(cfg)
    }

    /// Builds a controller without subscribers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(cfg: Config) -> Self {
        Self::builder(cfg).build()
    }

    pub(crate) fn from_parts(engine: Arc<Engine>, subs: Arc<SubscriberSet>) -> Self {
        let me = Self { engine, subs };
        me.subscriber_listener();
        me
    }

    pub fn id(&self) -> u64 {
        self.engine.id
    }

    pub fn config(&self) -> &Config {
        &self.engine.cfg
    }

    /// Creates a transaction that may submit tasks and mutate services.
    pub fn create_update_transaction(&self) -> Transaction {
        let txn = Transaction::new(Arc::clone(&self.engine), TxnKind::Update);
        tracing::debug!(txn = txn.id(), controller = self.id(), "update transaction created");
        txn
    }

    /// Creates a transaction that can only observe.
    pub fn create_read_transaction(&self) -> Transaction {
        Transaction::new(Arc::clone(&self.engine), TxnKind::Read)
    }

    /// True if `txn` was created by this controller.
    pub fn owns(&self, txn: &Transaction) -> bool {
        txn.controller_id() == self.id()
    }

    /// Direct receiver on the event bus (in addition to configured subscribers).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.engine.bus.subscribe()
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.engine.bus.subscribe();
        let set = Arc::clone(&self.subs);
        self.engine.runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
