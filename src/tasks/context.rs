//! # Execution and revert contexts.
//!
//! A context is the only channel through which a task body talks to the
//! engine. Contexts are cheap to clone; the engine tracks the last clone so a
//! body that forgets to report cannot stall its transaction.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::graph::{Outcome, TaskNode};
use crate::core::{Problem, Transaction};
use crate::error::TxnError;

use super::handle::TaskHandle;
use super::spec::TaskSpec;

/// Handle given to [`Executable::execute`](crate::Executable::execute).
#[derive(Clone)]
pub struct ExecuteContext {
    inner: Arc<ExecuteInner>,
}

struct ExecuteInner {
    txn: Transaction,
    node: Arc<TaskNode>,
}

impl Drop for ExecuteInner {
    fn drop(&mut self) {
        let problem = Problem::critical("execute context dropped without an outcome")
            .with_source(self.node.name.clone());
        if self
            .txn
            .report_outcome(&self.node, Outcome::Failed, Some(problem))
        {
            tracing::warn!(txn = self.txn.id(), task = %self.node.name, "task abandoned its execute context");
        }
    }
}

impl ExecuteContext {
    pub(crate) fn new(txn: Transaction, node: Arc<TaskNode>) -> Self {
        Self {
            inner: Arc::new(ExecuteInner { txn, node }),
        }
    }

    /// Reports successful execution of this task's own body.
    pub fn complete(&self) {
        self.report(Outcome::Completed, None);
    }

    /// Reports that the task chose not to do its work.
    pub fn cancelled(&self) {
        self.report(Outcome::Cancelled, None);
    }

    /// Reports a failed execution; the problem is added to the transaction report.
    pub fn failed(&self, problem: Problem) {
        let problem = attach_source(problem, &self.inner.node);
        self.report(Outcome::Failed, Some(problem));
    }

    /// Adds a problem without changing the task outcome.
    pub fn add_problem(&self, problem: Problem) {
        let problem = attach_source(problem, &self.inner.node);
        self.inner.txn.add_problem(problem);
    }

    /// Submits a child task; it must finish before this task counts as executed.
    ///
    /// Allowed only until this task reports its own outcome.
    pub fn submit(&self, spec: TaskSpec) -> Result<TaskHandle, TxnError> {
        self.inner.txn.insert(spec, Some(&self.inner.node))
    }

    /// True once rollback was requested for the owning transaction.
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.txn.is_cancel_requested()
    }

    /// Token cancelled when rollback is requested (child token; cancelling it has no effect on the transaction).
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.txn.cancel_token().child_token()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.inner.txn
    }

    /// Handle of the task being executed.
    pub fn task(&self) -> TaskHandle {
        TaskHandle::new(Arc::clone(&self.inner.node))
    }

    pub(crate) fn node(&self) -> &Arc<TaskNode> {
        &self.inner.node
    }

    fn report(&self, outcome: Outcome, problem: Option<Problem>) {
        if !self
            .inner
            .txn
            .report_outcome(&self.inner.node, outcome, problem)
        {
            tracing::debug!(task = %self.inner.node.name, ?outcome, "outcome already reported; ignored");
        }
    }
}

/// Handle given to [`Revertible::revert`](crate::Revertible::revert).
#[derive(Clone)]
pub struct RevertContext {
    inner: Arc<RevertInner>,
}

struct RevertInner {
    txn: Transaction,
    node: Arc<TaskNode>,
}

impl Drop for RevertInner {
    fn drop(&mut self) {
        let problem = Problem::warning("revert context dropped without completion")
            .with_source(self.node.name.clone());
        if self.txn.finish_revert(&self.node, Some(problem)) {
            tracing::warn!(txn = self.txn.id(), task = %self.node.name, "task abandoned its revert context");
        }
    }
}

impl RevertContext {
    pub(crate) fn new(txn: Transaction, node: Arc<TaskNode>) -> Self {
        Self {
            inner: Arc::new(RevertInner { txn, node }),
        }
    }

    /// Reports that the revert finished.
    pub fn complete(&self) {
        if !self.inner.txn.finish_revert(&self.inner.node, None) {
            tracing::debug!(task = %self.inner.node.name, "revert already completed; ignored");
        }
    }

    pub fn add_problem(&self, problem: Problem) {
        let problem = attach_source(problem, &self.inner.node);
        self.inner.txn.add_problem(problem);
    }

    pub fn transaction(&self) -> &Transaction {
        &self.inner.txn
    }

    pub fn task(&self) -> TaskHandle {
        TaskHandle::new(Arc::clone(&self.inner.node))
    }
}

fn attach_source(problem: Problem, node: &TaskNode) -> Problem {
    if problem.source().is_some() {
        problem
    } else {
        problem.with_source(node.name.clone())
    }
}
