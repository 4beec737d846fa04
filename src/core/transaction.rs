//! # Transactions: task graphs with commit, abort and rollback.
//!
//! A [`Transaction`] owns a graph of tasks. Tasks run as soon as their
//! dependencies executed; each task may submit children while it runs. Once the
//! graph is quiet the caller decides the outcome.
//!
//! ## Phases
//! ```text
//!                 prepare()                 commit()
//!   ACTIVE ───────────────────► PREPARED ─────────────► COMMITTED
//!     │   (quiesce, validate)      │
//!     │                            │ abort()
//!     │ rollback()                 ▼
//!     │ (cancel, quiesce,       ABORTED      (reverse-order revert)
//!     ▼  revert)
//!   ROLLED_BACK
//! ```
//!
//! ## Rules
//! - Quiescence means no task is `New` or `Executing`; only then does the
//!   transaction seal itself against further submissions.
//! - Revert order: a task reverts only after all of its executed children and
//!   executed dependents reverted. `Cancelled`/`Failed` tasks never revert.
//! - A dependency that is already `Cancelled`/`Failed` cancels the new task
//!   immediately (transitive cancellation); submission itself succeeds.
//! - One phase operation at a time; a concurrent one gets [`TxnError::Busy`].
//! - Cancellation is cooperative: rollback only raises the flag that task
//!   bodies observe through their context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::TxnError;
use crate::events::{Event, EventKind};
use crate::tasks::{TaskHandle, TaskSpec, TaskState};

use super::controller::Engine;
use super::graph::{Outcome, TaskNode};
use super::problem::{Problem, ProblemReport};
use super::runner;

static TXN_SEQ: AtomicU64 = AtomicU64::new(1);

/// Transaction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnState {
    Active,
    Prepared,
    Committed,
    Aborted,
    RolledBack,
}

impl TxnState {
    /// True for `Committed`, `Aborted` and `RolledBack`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxnState::Committed | TxnState::Aborted | TxnState::RolledBack
        )
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            TxnState::Active => "active",
            TxnState::Prepared => "prepared",
            TxnState::Committed => "committed",
            TxnState::Aborted => "aborted",
            TxnState::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Whether a transaction may mutate anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnKind {
    Update,
    Read,
}

/// Hook run during `prepare`, after the task graph quiesced.
pub trait Validate: Send + Sync + 'static {
    /// Adds problems found in the state being committed.
    fn validate(&self, report: &mut ProblemReport);
}

/// Validation hooks of one transaction.
#[derive(Default)]
struct Validators {
    /// Service controllers, one entry per controller however often it registers.
    services: HashMap<u64, Arc<dyn Validate>>,
    custom: Vec<Arc<dyn Validate>>,
}

impl Validators {
    fn all(&self) -> Vec<Arc<dyn Validate>> {
        self.services
            .values()
            .chain(self.custom.iter())
            .cloned()
            .collect()
    }
}

/// Cloneable handle to one transaction.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxnInner>,
}

struct TxnInner {
    id: u64,
    kind: TxnKind,
    engine: Arc<Engine>,
    status: Mutex<Status>,
    tasks: Mutex<Vec<Arc<TaskNode>>>,
    validators: Mutex<Validators>,
    problems: Mutex<ProblemReport>,
    outstanding: watch::Sender<usize>,
    reverting: watch::Sender<usize>,
    cancel: CancellationToken,
}

struct Status {
    state: TxnState,
    sealed: bool,
    busy: bool,
}

/// Clears the `busy` flag when a phase operation ends (including early returns).
struct PhaseGuard<'a> {
    txn: &'a Transaction,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.txn.inner.status.lock().busy = false;
    }
}

impl Transaction {
    pub(crate) fn new(engine: Arc<Engine>, kind: TxnKind) -> Self {
        let (outstanding, _) = watch::channel(0usize);
        let (reverting, _) = watch::channel(0usize);
        Self {
            inner: Arc::new(TxnInner {
                id: TXN_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
                kind,
                engine,
                status: Mutex::new(Status {
                    state: TxnState::Active,
                    sealed: false,
                    busy: false,
                }),
                tasks: Mutex::new(Vec::new()),
                validators: Mutex::new(Validators::default()),
                problems: Mutex::new(ProblemReport::new()),
                outstanding,
                reverting,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> TxnKind {
        self.inner.kind
    }

    /// Id of the transaction controller that created this transaction.
    pub fn controller_id(&self) -> u64 {
        self.inner.engine.id
    }

    pub fn state(&self) -> TxnState {
        self.inner.status.lock().state
    }

    /// True while new work may still be submitted.
    pub fn is_active(&self) -> bool {
        let st = self.inner.status.lock();
        st.state == TxnState::Active && !st.sealed
    }

    /// True once rollback was requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Snapshot of the problems reported so far.
    pub fn problems(&self) -> ProblemReport {
        self.inner.problems.lock().clone()
    }

    /// Adds a problem to the report and publishes it.
    pub fn add_problem(&self, problem: Problem) {
        let mut ev = Event::new(EventKind::ProblemReported)
            .with_severity(problem.severity())
            .with_reason(problem.message());
        if let Some(src) = problem.source() {
            ev = ev.with_task(src);
        }
        self.inner.problems.lock().add(problem);
        self.publish(ev);
    }

    /// Registers a validation hook run by [`prepare`](Self::prepare).
    ///
    /// Every call adds a hook; hooks never replace each other.
    pub fn add_validator(&self, validator: Arc<dyn Validate>) {
        self.inner.validators.lock().custom.push(validator);
    }

    /// Registers the validator of service controller `id`; repeats are no-ops.
    pub(crate) fn add_service_validator(&self, id: u64, validator: Arc<dyn Validate>) {
        self.inner
            .validators
            .lock()
            .services
            .entry(id)
            .or_insert(validator);
    }

    /// Submits a top-level task.
    pub fn submit(&self, spec: TaskSpec) -> Result<TaskHandle, TxnError> {
        self.insert(spec, None)
    }

    /// Waits for the graph to quiesce, runs validation and moves to `Prepared`.
    ///
    /// Problems never make `prepare` fail; check [`Transaction::can_commit`].
    pub async fn prepare(&self) -> Result<(), TxnError> {
        let _phase = self.enter_phase(TxnState::Active, "an active transaction")?;
        self.quiesce_and_seal().await;

        let validators = self.inner.validators.lock().all();
        let mut report = ProblemReport::new();
        for validator in validators {
            validator.validate(&mut report);
        }
        for problem in report {
            self.add_problem(problem);
        }

        let worst = self.inner.problems.lock().max_severity();
        self.set_state(TxnState::Prepared);
        let mut ev = Event::new(EventKind::TxnPrepared);
        if let Some(severity) = worst {
            ev = ev.with_severity(severity);
        }
        self.publish(ev);
        tracing::debug!(txn = self.id(), ?worst, "transaction prepared");
        Ok(())
    }

    /// True if prepared and no problem reaches the configured commit threshold.
    pub fn can_commit(&self) -> bool {
        self.state() == TxnState::Prepared && self.blocking_problems() == 0
    }

    /// Makes the prepared outcome permanent.
    ///
    /// Fails with [`TxnError::CommitBlocked`] when problems reach the commit
    /// threshold; the transaction stays `Prepared` and should be aborted.
    pub fn commit(&self) -> Result<(), TxnError> {
        let _phase = self.enter_phase(TxnState::Prepared, "a prepared transaction")?;
        let count = self.blocking_problems();
        if count > 0 {
            return Err(TxnError::CommitBlocked {
                severity: self.inner.engine.cfg.commit_threshold,
                count,
            });
        }
        self.set_state(TxnState::Committed);
        self.retire();
        self.publish(Event::new(EventKind::TxnCommitted));
        tracing::debug!(txn = self.id(), "transaction committed");
        Ok(())
    }

    /// Reverts a prepared transaction.
    pub async fn abort(&self) -> Result<(), TxnError> {
        let _phase = self.enter_phase(TxnState::Prepared, "a prepared transaction")?;
        self.revert_all().await;
        self.set_state(TxnState::Aborted);
        self.retire();
        self.publish(Event::new(EventKind::TxnAborted));
        tracing::debug!(txn = self.id(), "transaction aborted");
        Ok(())
    }

    /// Requests cancellation, waits for running tasks, then reverts everything executed.
    pub async fn rollback(&self) -> Result<(), TxnError> {
        let _phase = self.enter_phase(TxnState::Active, "an active transaction")?;
        self.inner.cancel.cancel();
        self.quiesce_and_seal().await;
        self.revert_all().await;
        self.set_state(TxnState::RolledBack);
        self.retire();
        self.publish(Event::new(EventKind::TxnRolledBack));
        tracing::debug!(txn = self.id(), "transaction rolled back");
        Ok(())
    }

    // ---- facade support ----

    /// Checks that this transaction may mutate state owned by controller `owner`.
    ///
    /// Order of checks: ownership (argument error), kind, then phase (state error).
    pub(crate) fn check_update(&self, owner: u64) -> Result<(), TxnError> {
        if self.inner.engine.id != owner {
            return Err(TxnError::ForeignTransaction { txn: self.id() });
        }
        if self.inner.kind == TxnKind::Read {
            return Err(TxnError::ReadOnly { txn: self.id() });
        }
        let st = self.inner.status.lock();
        if st.state != TxnState::Active || st.sealed {
            return Err(TxnError::InvalidState {
                txn: self.id(),
                state: st.state,
                expected: "an active transaction",
            });
        }
        Ok(())
    }

    /// True if a task submitted under `parent` may depend on `dep` without
    /// failing submission or waiting forever.
    pub(crate) fn admits_dependency(&self, parent: Option<&Arc<TaskNode>>, dep: &TaskHandle) -> bool {
        if dep.node.txn_id != self.id() {
            return false;
        }
        if !matches!(
            dep.state(),
            TaskState::New | TaskState::Executing | TaskState::Executed
        ) {
            return false;
        }
        match parent {
            Some(parent) => !dep.node.waits_on_any(&parent.lineage()),
            None => true,
        }
    }

    pub(crate) fn engine(&self) -> &Arc<Engine> {
        &self.inner.engine
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.inner.engine.bus.publish(ev.with_txn(self.id()));
    }

    // ---- graph construction ----

    pub(crate) fn insert(
        &self,
        spec: TaskSpec,
        parent: Option<&Arc<TaskNode>>,
    ) -> Result<TaskHandle, TxnError> {
        if self.inner.kind == TxnKind::Read {
            return Err(TxnError::ReadOnly { txn: self.id() });
        }

        let (name, executable, revertible, handles) = spec.into_parts();
        let mut dependencies = Vec::with_capacity(handles.len());
        for handle in handles {
            let dep = handle.node;
            if dep.txn_id != self.id() {
                return Err(TxnError::ForeignDependency {
                    task: dep.name.to_string(),
                });
            }
            if matches!(dep.state(), TaskState::Reverting | TaskState::Reverted) {
                return Err(TxnError::InvalidDependency {
                    task: dep.name.to_string(),
                    reason: "dependency is already reverting",
                });
            }
            dependencies.push(dep);
        }
        if let Some(parent) = parent {
            let lineage = parent.lineage();
            if let Some(dep) = dependencies.iter().find(|d| d.waits_on_any(&lineage)) {
                return Err(TxnError::InvalidDependency {
                    task: dep.name.to_string(),
                    reason: "dependency waits on an ancestor of the new task",
                });
            }
        }

        let node = Arc::new(TaskNode::new(
            Arc::from(name.as_ref()),
            self.id(),
            parent.cloned(),
            dependencies,
            executable,
            revertible,
        ));

        {
            let st = self.inner.status.lock();
            if st.state != TxnState::Active || st.sealed {
                return Err(TxnError::InvalidState {
                    txn: self.id(),
                    state: st.state,
                    expected: "an active transaction",
                });
            }
            if let Some(parent) = parent {
                let mut pg = parent.inner.lock();
                if pg.state != TaskState::Executing || pg.outcome.is_some() {
                    return Err(TxnError::TaskClosed {
                        task: parent.name.to_string(),
                    });
                }
                pg.pending_children += 1;
                pg.children.push(Arc::downgrade(&node));
            }
            self.inner.outstanding.send_modify(|n| *n += 1);
            self.inner.tasks.lock().push(Arc::clone(&node));
        }
        self.publish(Event::new(EventKind::TaskSubmitted).with_task(node.name.clone()));

        let mut doomed = false;
        for dep in &node.dependencies {
            let mut dg = dep.inner.lock();
            dg.dependents.push(Arc::downgrade(&node));
            match dg.state {
                TaskState::Executed => node.inner.lock().waiting_on -= 1,
                TaskState::Cancelled | TaskState::Failed => doomed = true,
                _ => {}
            }
        }
        // Release the registration hold.
        self.dependency_settled(&node, !doomed);

        Ok(TaskHandle::new(node))
    }

    // ---- execution bookkeeping ----

    fn dependency_settled(&self, node: &Arc<TaskNode>, executed: bool) {
        let dependents = {
            let mut g = node.inner.lock();
            if g.state != TaskState::New {
                return;
            }
            if executed {
                g.waiting_on = g.waiting_on.saturating_sub(1);
                if g.waiting_on > 0 {
                    return;
                }
                g.state = TaskState::Executing;
                None
            } else {
                g.state = TaskState::Cancelled;
                Some(g.dependents.clone())
            }
        };
        match dependents {
            None => self.launch(node),
            Some(dependents) => self.on_settled(
                node,
                TaskState::Cancelled,
                dependents,
                Some(Arc::from("dependency did not execute")),
            ),
        }
    }

    fn launch(&self, node: &Arc<TaskNode>) {
        self.publish(Event::new(EventKind::TaskExecuting).with_task(node.name.clone()));
        self.inner
            .engine
            .runtime
            .spawn(runner::execute(self.clone(), Arc::clone(node)));
    }

    /// Records the outcome of a task's own body. Returns `false` if one was already recorded.
    pub(crate) fn report_outcome(
        &self,
        node: &Arc<TaskNode>,
        outcome: Outcome,
        problem: Option<Problem>,
    ) -> bool {
        let settled = {
            let mut g = node.inner.lock();
            if g.state != TaskState::Executing || g.outcome.is_some() {
                return false;
            }
            g.outcome = Some(outcome);
            if g.pending_children == 0 {
                let state = outcome.settled_state();
                g.state = state;
                Some((state, g.dependents.clone()))
            } else {
                None
            }
        };
        let reason = problem.as_ref().map(|p| Arc::<str>::from(p.message()));
        if let Some(problem) = problem {
            self.add_problem(problem);
        }
        if let Some((state, dependents)) = settled {
            self.on_settled(node, state, dependents, reason);
        }
        true
    }

    fn child_settled(&self, parent: &Arc<TaskNode>) {
        let settled = {
            let mut g = parent.inner.lock();
            g.pending_children = g.pending_children.saturating_sub(1);
            match g.outcome {
                Some(outcome) if g.pending_children == 0 && g.state == TaskState::Executing => {
                    let state = outcome.settled_state();
                    g.state = state;
                    Some((state, g.dependents.clone()))
                }
                _ => None,
            }
        };
        if let Some((state, dependents)) = settled {
            self.on_settled(parent, state, dependents, None);
        }
    }

    /// Propagates a settled state. `dependents` is the snapshot taken together with the state change.
    fn on_settled(
        &self,
        node: &Arc<TaskNode>,
        state: TaskState,
        dependents: Vec<Weak<TaskNode>>,
        reason: Option<Arc<str>>,
    ) {
        let kind = match state {
            TaskState::Executed => EventKind::TaskExecuted,
            TaskState::Failed => EventKind::TaskFailed,
            _ => EventKind::TaskCancelled,
        };
        let mut ev = Event::new(kind).with_task(node.name.clone());
        if let Some(reason) = reason {
            ev = ev.with_reason(reason);
        }
        self.publish(ev);

        let executed = state == TaskState::Executed;
        for dependent in dependents.iter().filter_map(Weak::upgrade) {
            self.dependency_settled(&dependent, executed);
        }
        if let Some(parent) = &node.parent {
            self.child_settled(parent);
        }
        self.inner
            .outstanding
            .send_modify(|n| *n = n.saturating_sub(1));
    }

    // ---- phases ----

    fn enter_phase(
        &self,
        expected: TxnState,
        what: &'static str,
    ) -> Result<PhaseGuard<'_>, TxnError> {
        let mut st = self.inner.status.lock();
        if st.busy {
            return Err(TxnError::Busy { txn: self.id() });
        }
        if st.state != expected {
            return Err(TxnError::InvalidState {
                txn: self.id(),
                state: st.state,
                expected: what,
            });
        }
        st.busy = true;
        Ok(PhaseGuard { txn: self })
    }

    fn set_state(&self, state: TxnState) {
        self.inner.status.lock().state = state;
    }

    fn blocking_problems(&self) -> usize {
        self.inner
            .problems
            .lock()
            .count_at_least(self.inner.engine.cfg.commit_threshold)
    }

    async fn quiesce_and_seal(&self) {
        let mut rx = self.inner.outstanding.subscribe();
        loop {
            let _ = rx.wait_for(|n| *n == 0).await;
            if self.try_seal() {
                return;
            }
        }
    }

    fn try_seal(&self) -> bool {
        let mut st = self.inner.status.lock();
        if *self.inner.outstanding.borrow() == 0 {
            st.sealed = true;
            true
        } else {
            false
        }
    }

    /// Drops the graph; handles held by callers keep their nodes alive.
    fn retire(&self) {
        self.inner.tasks.lock().clear();
        *self.inner.validators.lock() = Validators::default();
    }

    // ---- revert ----

    async fn revert_all(&self) {
        let executed: Vec<Arc<TaskNode>> = self
            .inner
            .tasks
            .lock()
            .iter()
            .filter(|n| n.state() == TaskState::Executed)
            .cloned()
            .collect();

        for node in &executed {
            let blockers = node
                .children()
                .iter()
                .chain(node.dependents().iter())
                .filter(|n| n.state() == TaskState::Executed)
                .count();
            node.inner.lock().pending_reverts = blockers;
        }

        self.inner.reverting.send_replace(executed.len());
        let ready: Vec<Arc<TaskNode>> = executed
            .iter()
            .filter(|n| n.inner.lock().pending_reverts == 0)
            .cloned()
            .collect();
        for node in &ready {
            self.launch_revert(node);
        }

        let mut rx = self.inner.reverting.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn launch_revert(&self, node: &Arc<TaskNode>) {
        {
            let mut g = node.inner.lock();
            if g.state != TaskState::Executed {
                return;
            }
            g.state = TaskState::Reverting;
        }
        self.publish(Event::new(EventKind::TaskReverting).with_task(node.name.clone()));
        self.inner
            .engine
            .runtime
            .spawn(runner::revert(self.clone(), Arc::clone(node)));
    }

    /// Marks a revert finished and unblocks the parent and dependencies.
    /// Returns `false` if the task was not reverting.
    pub(crate) fn finish_revert(&self, node: &Arc<TaskNode>, problem: Option<Problem>) -> bool {
        {
            let mut g = node.inner.lock();
            if g.state != TaskState::Reverting {
                return false;
            }
            g.state = TaskState::Reverted;
        }
        if let Some(problem) = problem {
            self.add_problem(problem);
        }
        self.publish(Event::new(EventKind::TaskReverted).with_task(node.name.clone()));

        if let Some(parent) = &node.parent {
            self.release_revert(parent);
        }
        for dep in &node.dependencies {
            self.release_revert(dep);
        }
        self.inner
            .reverting
            .send_modify(|n| *n = n.saturating_sub(1));
        true
    }

    fn release_revert(&self, node: &Arc<TaskNode>) {
        let ready = {
            let mut g = node.inner.lock();
            if g.state != TaskState::Executed {
                return;
            }
            g.pending_reverts = g.pending_reverts.saturating_sub(1);
            g.pending_reverts == 0
        };
        if ready {
            self.launch_revert(node);
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("state", &self.state())
            .finish()
    }
}
