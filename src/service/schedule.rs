//! Where lifecycle tasks go.
//!
//! A controller reacting from inside another task's execute body submits its
//! follow-up tasks as children of that task; a controller reacting to a
//! facade call submits top-level tasks. Reverts restore state without
//! scheduling anything.

use crate::core::Transaction;
use crate::error::TxnError;
use crate::tasks::{ExecuteContext, TaskHandle, TaskSpec};

pub(crate) enum Scheduler<'a> {
    Txn(&'a Transaction),
    Task(&'a ExecuteContext),
}

impl Scheduler<'_> {
    pub(crate) fn transaction(&self) -> &Transaction {
        match self {
            Scheduler::Txn(txn) => txn,
            Scheduler::Task(ctx) => ctx.transaction(),
        }
    }

    pub(crate) fn submit(&self, spec: TaskSpec) -> Result<TaskHandle, TxnError> {
        match self {
            Scheduler::Txn(txn) => txn.submit(spec),
            Scheduler::Task(ctx) => ctx.submit(spec),
        }
    }

    /// True if a task submitted here may list `dep` as a dependency.
    pub(crate) fn admits(&self, dep: &TaskHandle) -> bool {
        let parent = match self {
            Scheduler::Txn(_) => None,
            Scheduler::Task(ctx) => Some(ctx.node()),
        };
        self.transaction().admits_dependency(parent, dep)
    }
}

/// How a state change propagates.
#[derive(Clone, Copy)]
pub(crate) enum Via<'a> {
    /// Run transitions and submit the resulting tasks.
    Schedule(&'a Scheduler<'a>),
    /// Update counters only (revert path).
    Quiet,
}
