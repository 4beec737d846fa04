//! # LogWriter: event renderer over `tracing`
//!
//! A minimal subscriber that forwards incoming [`Event`]s to `tracing`, one
//! record per event, at a level matching the event's weight. Use it for tests,
//! demos or as a template for real sinks.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG servicevisor: task-executed txn=4 task="start db"
//!  WARN servicevisor: task-failed txn=4 task="start api" reason="connection refused"
//!  INFO servicevisor: service-up txn=4 service="db"
//!  INFO servicevisor: txn-committed txn=4
//! ```

use async_trait::async_trait;

use crate::core::Severity;
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let label = e.kind.as_label();
        let task = e.task.as_deref().unwrap_or("-");
        let service = e.service.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::TaskFailed | EventKind::ServiceFailed | EventKind::SubscriberPanicked => {
                tracing::warn!(target: "servicevisor", txn = ?e.txn, task, service, reason, "{label}");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "servicevisor", subscriber = task, reason, "{label}");
            }
            EventKind::ProblemReported => match e.severity {
                Some(Severity::Error | Severity::Critical) => {
                    tracing::error!(target: "servicevisor", txn = ?e.txn, task, reason, "{label}");
                }
                _ => {
                    tracing::info!(target: "servicevisor", txn = ?e.txn, task, reason, "{label}");
                }
            },
            EventKind::ServiceStarting
            | EventKind::ServiceUp
            | EventKind::ServiceStopping
            | EventKind::ServiceDown
            | EventKind::ServiceRemoved => {
                tracing::info!(target: "servicevisor", txn = ?e.txn, service, "{label}");
            }
            EventKind::TxnPrepared
            | EventKind::TxnCommitted
            | EventKind::TxnAborted
            | EventKind::TxnRolledBack => {
                tracing::info!(target: "servicevisor", txn = ?e.txn, severity = ?e.severity, "{label}");
            }
            EventKind::TaskSubmitted
            | EventKind::TaskExecuting
            | EventKind::TaskExecuted
            | EventKind::TaskCancelled
            | EventKind::TaskReverting
            | EventKind::TaskReverted => {
                tracing::debug!(target: "servicevisor", txn = ?e.txn, task, "{label}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
