//! # Runtime events emitted by transactions, tasks and service controllers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Task events**: execution and revert flow of a single task
//! - **Transaction events**: outcome of prepare/commit/abort/rollback
//! - **Service events**: controller lifecycle transitions
//! - **Subscriber events**: health of the fan-out workers
//!
//! The [`Event`] struct carries metadata such as timestamps, transaction id,
//! task or service name and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use servicevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_txn(3)
//!     .with_task("install db")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.txn, Some(3));
//! assert_eq!(ev.task.as_deref(), Some("install db"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::core::Severity;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Task events ===
    /// Task was added to a transaction graph.
    ///
    /// Sets: `txn`, `task`
    TaskSubmitted,

    /// Task's execute body is about to run.
    ///
    /// Sets: `txn`, `task`
    TaskExecuting,

    /// Task and all of its children finished successfully.
    ///
    /// Sets: `txn`, `task`
    TaskExecuted,

    /// Task was cancelled (by itself, by a dependency, or never ran).
    ///
    /// Sets: `txn`, `task`
    TaskCancelled,

    /// Task's execute body failed, panicked or abandoned its context.
    ///
    /// Sets: `txn`, `task`, `reason`
    TaskFailed,

    /// Task's revert body is about to run.
    ///
    /// Sets: `txn`, `task`
    TaskReverting,

    /// Task's revert finished.
    ///
    /// Sets: `txn`, `task`
    TaskReverted,

    // === Transaction events ===
    /// Task graph quiesced and validation ran.
    ///
    /// Sets: `txn`, `severity` (highest problem, if any)
    TxnPrepared,

    /// Transaction committed.
    ///
    /// Sets: `txn`
    TxnCommitted,

    /// Prepared transaction was aborted and fully reverted.
    ///
    /// Sets: `txn`
    TxnAborted,

    /// Active transaction was rolled back and fully reverted.
    ///
    /// Sets: `txn`
    TxnRolledBack,

    /// A problem was added to a transaction report.
    ///
    /// Sets: `txn`, `severity`, `reason`, optionally `task`
    ProblemReported,

    // === Service events ===
    /// Controller scheduled a start.
    ///
    /// Sets: `txn`, `service`
    ServiceStarting,

    /// Service start completed.
    ///
    /// Sets: `txn`, `service`
    ServiceUp,

    /// Service start failed.
    ///
    /// Sets: `txn`, `service`, `reason`
    ServiceFailed,

    /// Controller scheduled a stop.
    ///
    /// Sets: `txn`, `service`
    ServiceStopping,

    /// Service stop completed.
    ///
    /// Sets: `txn`, `service`
    ServiceDown,

    /// Controller released its names.
    ///
    /// Sets: `txn`, `service`
    ServiceRemoved,
}

impl EventKind {
    /// Returns a short stable label (kebab-case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::TaskSubmitted => "task-submitted",
            EventKind::TaskExecuting => "task-executing",
            EventKind::TaskExecuted => "task-executed",
            EventKind::TaskCancelled => "task-cancelled",
            EventKind::TaskFailed => "task-failed",
            EventKind::TaskReverting => "task-reverting",
            EventKind::TaskReverted => "task-reverted",
            EventKind::TxnPrepared => "txn-prepared",
            EventKind::TxnCommitted => "txn-committed",
            EventKind::TxnAborted => "txn-aborted",
            EventKind::TxnRolledBack => "txn-rolled-back",
            EventKind::ProblemReported => "problem-reported",
            EventKind::ServiceStarting => "service-starting",
            EventKind::ServiceUp => "service-up",
            EventKind::ServiceFailed => "service-failed",
            EventKind::ServiceStopping => "service-stopping",
            EventKind::ServiceDown => "service-down",
            EventKind::ServiceRemoved => "service-removed",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Transaction id, if applicable.
    pub txn: Option<u64>,
    /// Task name (or subscriber name for subscriber events).
    pub task: Option<Arc<str>>,
    /// Service name, if applicable.
    pub service: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Problem severity, if applicable.
    pub severity: Option<Severity>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            txn: None,
            task: None,
            service: None,
            reason: None,
            severity: None,
        }
    }

    /// Attaches a transaction id.
    #[inline]
    pub fn with_txn(mut self, txn: u64) -> Self {
        self.txn = Some(txn);
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a service name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a severity.
    #[inline]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
