//! # Task handles and execution states.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::core::graph::TaskNode;

/// Lifecycle state of a task inside its transaction.
///
/// ```text
/// NEW ──► EXECUTING ──► EXECUTED ──► REVERTING ──► REVERTED
///  │          │
///  │          ├──► CANCELLED
///  │          └──► FAILED
///  └──► CANCELLED   (a dependency did not execute)
/// ```
///
/// A task stays `Executing` after its own body reported an outcome until every
/// child it submitted reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting for dependencies.
    New,
    /// Body running, or waiting for children.
    Executing,
    /// Body and all children finished; eligible for revert.
    Executed,
    /// Cancelled by itself or transitively; never reverted.
    Cancelled,
    /// Body failed or panicked; never reverted.
    Failed,
    /// Revert body running.
    Reverting,
    /// Revert finished.
    Reverted,
}

impl TaskState {
    /// True once execution produced a final answer (including later revert states).
    pub fn is_settled(&self) -> bool {
        !matches!(self, TaskState::New | TaskState::Executing)
    }

    /// True if the task executed successfully at some point.
    pub fn has_executed(&self) -> bool {
        matches!(
            self,
            TaskState::Executed | TaskState::Reverting | TaskState::Reverted
        )
    }

    /// Returns a short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskState::New => "new",
            TaskState::Executing => "executing",
            TaskState::Executed => "executed",
            TaskState::Cancelled => "cancelled",
            TaskState::Failed => "failed",
            TaskState::Reverting => "reverting",
            TaskState::Reverted => "reverted",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Shared reference to a submitted task.
///
/// Handles are what later submissions list as dependencies. They stay valid
/// after the transaction terminates (state queries keep working).
#[derive(Clone)]
pub struct TaskHandle {
    pub(crate) node: Arc<TaskNode>,
}

impl TaskHandle {
    pub(crate) fn new(node: Arc<TaskNode>) -> Self {
        Self { node }
    }

    /// Engine-wide unique task id.
    pub fn id(&self) -> u64 {
        self.node.id
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Id of the owning transaction.
    pub fn transaction_id(&self) -> u64 {
        self.node.txn_id
    }

    /// Current state (snapshot).
    pub fn state(&self) -> TaskState {
        self.node.state()
    }

    pub(crate) fn downgrade(&self) -> WeakTaskHandle {
        WeakTaskHandle {
            node: Arc::downgrade(&self.node),
        }
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.node.id)
            .field("name", &self.node.name)
            .field("txn", &self.node.txn_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Non-owning task reference; lives as long as the transaction keeps the task.
#[derive(Clone, Default)]
pub(crate) struct WeakTaskHandle {
    node: Weak<TaskNode>,
}

impl WeakTaskHandle {
    pub(crate) fn upgrade(&self) -> Option<TaskHandle> {
        self.node.upgrade().map(TaskHandle::new)
    }
}
