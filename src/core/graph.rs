//! # Task graph nodes.
//!
//! One [`TaskNode`] per submitted task. Edges that point "backwards" in time
//! (to the parent, to dependencies) are strong; edges that point "forwards"
//! (to children, to dependents) are weak. The owning transaction holds every
//! node strongly until it terminates, so weak edges always upgrade while the
//! graph is live, and no reference cycles exist.
//!
//! ## Counters
//! - `waiting_on`: unexecuted dependencies **plus one** registration hold,
//!   released once submission finished wiring the node.
//! - `pending_children`: children not yet in a settled state.
//! - `pending_reverts`: executed children plus executed dependents that still
//!   have to revert (revert phase only).

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::tasks::{Executable, Revertible, TaskState};

static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Outcome reported by a task's own execute body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed,
    Cancelled,
    Failed,
}

impl Outcome {
    pub(crate) fn settled_state(self) -> TaskState {
        match self {
            Outcome::Completed => TaskState::Executed,
            Outcome::Cancelled => TaskState::Cancelled,
            Outcome::Failed => TaskState::Failed,
        }
    }
}

pub(crate) struct TaskNode {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    pub(crate) txn_id: u64,
    pub(crate) parent: Option<Arc<TaskNode>>,
    pub(crate) dependencies: Vec<Arc<TaskNode>>,
    pub(crate) executable: Arc<dyn Executable>,
    pub(crate) revertible: Option<Arc<dyn Revertible>>,
    pub(crate) inner: Mutex<NodeInner>,
}

pub(crate) struct NodeInner {
    pub(crate) state: TaskState,
    pub(crate) waiting_on: usize,
    pub(crate) outcome: Option<Outcome>,
    pub(crate) pending_children: usize,
    pub(crate) children: Vec<Weak<TaskNode>>,
    pub(crate) dependents: Vec<Weak<TaskNode>>,
    pub(crate) pending_reverts: usize,
}

impl TaskNode {
    pub(crate) fn new(
        name: Arc<str>,
        txn_id: u64,
        parent: Option<Arc<TaskNode>>,
        dependencies: Vec<Arc<TaskNode>>,
        executable: Arc<dyn Executable>,
        revertible: Option<Arc<dyn Revertible>>,
    ) -> Self {
        let waiting_on = dependencies.len() + 1;
        Self {
            id: TASK_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            name,
            txn_id,
            parent,
            dependencies,
            executable,
            revertible,
            inner: Mutex::new(NodeInner {
                state: TaskState::New,
                waiting_on,
                outcome: None,
                pending_children: 0,
                children: Vec::new(),
                dependents: Vec::new(),
                pending_reverts: 0,
            }),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    /// Live children (weak edges upgraded).
    pub(crate) fn children(&self) -> Vec<Arc<TaskNode>> {
        self.inner
            .lock()
            .children
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Live dependents (weak edges upgraded).
    pub(crate) fn dependents(&self) -> Vec<Arc<TaskNode>> {
        self.inner
            .lock()
            .dependents
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Ids of `self` and all of its ancestors.
    pub(crate) fn lineage(self: &Arc<Self>) -> HashSet<u64> {
        let mut ids = HashSet::new();
        let mut cursor = Some(Arc::clone(self));
        while let Some(node) = cursor {
            ids.insert(node.id);
            cursor = node.parent.clone();
        }
        ids
    }

    /// True if `self` is still waiting, directly or transitively, on any task in `targets`.
    ///
    /// A task waits on its unexecuted dependencies and on its unsettled
    /// children. Used to reject dependency edges that would make a child wait on
    /// a task that in turn waits on the child's own parent chain.
    pub(crate) fn waits_on_any(self: &Arc<Self>, targets: &HashSet<u64>) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![Arc::clone(self)];
        while let Some(node) = stack.pop() {
            if !seen.insert(node.id) {
                continue;
            }
            if node.state().is_settled() {
                continue;
            }
            if targets.contains(&node.id) {
                return true;
            }
            stack.extend(node.dependencies.iter().cloned());
            stack.extend(node.children());
        }
        false
    }
}
