//! # Service controller: the per-service state machine.
//!
//! A controller owns one [`Service`], the names it is registered under and
//! its outgoing dependency edges. Every change of its inputs (flags, demand,
//! satisfied dependencies, lifecycle task completion) runs one transition:
//! the next action is computed under the controller lock and the resulting
//! task is submitted after the lock is released.
//!
//! ```text
//!  input ──► lock ─► next_action(state, flags, demand, unsatisfied) ─► unlock
//!                                   │
//!                                   ▼
//!                       submit lifecycle task (start / stop / stop-failed / remove)
//!                       depending on the last task of every service it must follow
//! ```
//!
//! ## Rules
//! - A service starts when it is enabled (service and registry), not removed,
//!   wanted (`Active` or demanded) and every dependency is up.
//! - It stops when any of those stops holding; dependents are told first.
//! - Start tasks follow the dependencies' last tasks; stop tasks follow the
//!   dependents' last tasks.
//! - Demand on dependencies follows `demanded_by` crossing zero, except for
//!   `Active` services, which demand their dependencies for as long as they
//!   are installed.
//! - `demanded_by` changes only under the lock of the registration that
//!   forwards the demand, so it always equals the demand held on the
//!   controller's names. Lock order: registration, then controller.
//! - Propagation to dependencies compares the wanted state with what was
//!   last propagated, so racing demand and undemand calls cannot reorder.
//! - Reverts restore state without scheduling anything.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::{Problem, ProblemReport, Severity, Transaction, Validate};
use crate::error::{ServiceError, TxnError};
use crate::events::{Event, EventKind};
use crate::tasks::{
    ExecuteContext, ExecuteFn, RevertContext, RevertFn, TaskHandle, TaskSpec, TaskState,
    WeakTaskHandle,
};

use super::countdown::Countdown;
use super::cycle::find_cycle;
use super::dependency::{Dependency, DependencyEdge};
use super::lifecycle::{Lifecycle, Step};
use super::mode::ServiceMode;
use super::name::ServiceName;
use super::registration::Registration;
use super::schedule::{Scheduler, Via};
use super::service::{Service, ServiceValue};
use super::status::{Flags, ServiceState};

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Start,
    Stop { notify_down: bool },
    StopFailed,
    Remove,
}

struct ControllerInner {
    mode: ServiceMode,
    state: ServiceState,
    flags: Flags,
    unsatisfied: usize,
    demanded_by: usize,
    value: Option<ServiceValue>,
    /// Dependents were told this service is up.
    notified_up: bool,
    /// Dependency edges are bound (between install and clear).
    bound: bool,
    last_task: Option<WeakTaskHandle>,
    /// Armed by registry removal; released when the controller is cleared.
    removal_hooks: Vec<Arc<Countdown>>,
}

impl ControllerInner {
    fn enabled(&self) -> bool {
        self.flags.contains(Flags::SERVICE_ENABLED) && self.flags.contains(Flags::REGISTRY_ENABLED)
    }

    fn removed(&self) -> bool {
        self.flags.contains(Flags::SERVICE_REMOVED)
    }

    fn should_start(&self) -> bool {
        (self.mode == ServiceMode::Active || self.demanded_by > 0) && self.enabled() && !self.removed()
    }

    fn should_stop(&self) -> bool {
        (self.mode == ServiceMode::OnDemand && self.demanded_by == 0)
            || !self.enabled()
            || self.removed()
    }

    fn demands_dependencies(&self) -> bool {
        self.bound && (self.mode == ServiceMode::Active || self.demanded_by > 0)
    }

    /// A lifecycle task that never ran (cancelled or failed before its body
    /// reported) leaves the state half-way; fall back to a resting state.
    fn settle_abandoned(&mut self) {
        if !matches!(self.state, ServiceState::Starting | ServiceState::Stopping) {
            return;
        }
        let abandoned = self
            .last_task
            .as_ref()
            .and_then(WeakTaskHandle::upgrade)
            .is_some_and(|h| matches!(h.state(), TaskState::Cancelled | TaskState::Failed));
        if !abandoned {
            return;
        }
        self.state = match self.state {
            ServiceState::Starting => ServiceState::Down,
            _ => ServiceState::Failed,
        };
        if self.state == ServiceState::Failed {
            self.value = None;
        }
    }
}

/// Result of a demand counter update, applied once the registration lock is released.
pub(crate) struct DemandShift {
    rising: bool,
    action: Option<Action>,
}

/// Everything needed to build a controller.
pub(crate) struct ControllerParts {
    pub(crate) name: ServiceName,
    pub(crate) owner: u64,
    pub(crate) service: Arc<dyn Service>,
    pub(crate) mode: ServiceMode,
    pub(crate) primary: Arc<Registration>,
    pub(crate) aliases: Vec<Arc<Registration>>,
    pub(crate) dependencies: Vec<(Dependency, Arc<Registration>)>,
    pub(crate) registry_enabled: bool,
}

/// Handle to one installed service.
pub struct ServiceController {
    id: u64,
    name: ServiceName,
    owner: u64,
    service: Arc<dyn Service>,
    primary: Arc<Registration>,
    aliases: Vec<Arc<Registration>>,
    dependencies: Vec<Arc<DependencyEdge>>,
    inner: Mutex<ControllerInner>,
    /// Whether dependencies currently carry this controller's demand.
    demanding: Mutex<bool>,
}

impl ServiceController {
    pub(crate) fn new(parts: ControllerParts) -> Arc<Self> {
        let mut flags = Flags::default();
        flags.set(Flags::REGISTRY_ENABLED, parts.registry_enabled);
        let unsatisfied = parts.dependencies.len();
        Arc::new_cyclic(|me: &Weak<Self>| Self {
            id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
            name: parts.name,
            owner: parts.owner,
            service: parts.service,
            primary: parts.primary,
            aliases: parts.aliases,
            dependencies: parts
                .dependencies
                .into_iter()
                .map(|(dep, target)| Arc::new(DependencyEdge::new(dep, target, me.clone())))
                .collect(),
            inner: Mutex::new(ControllerInner {
                mode: parts.mode,
                state: ServiceState::Down,
                flags,
                unsatisfied,
                demanded_by: 0,
                value: None,
                notified_up: false,
                bound: false,
                last_task: None,
                removal_hooks: Vec::new(),
            }),
            demanding: Mutex::new(false),
        })
    }

    // ---- accessors ----

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Primary name.
    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    /// Alias names.
    pub fn aliases(&self) -> Vec<ServiceName> {
        self.aliases.iter().map(|r| r.name().clone()).collect()
    }

    pub fn mode(&self) -> ServiceMode {
        self.inner.lock().mode
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        let mut g = self.inner.lock();
        g.settle_abandoned();
        g.state
    }

    /// Value published by the running service.
    pub fn value(&self) -> Option<ServiceValue> {
        self.inner.lock().value.clone()
    }

    /// Typed variant of [`value`](Self::value).
    pub fn value_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value()?.downcast::<T>().ok()
    }

    /// Number of active demands on this service.
    pub fn demanded_by(&self) -> usize {
        self.inner.lock().demanded_by
    }

    /// Number of dependencies that are not up.
    pub fn unsatisfied_dependencies(&self) -> usize {
        self.inner.lock().unsatisfied
    }

    /// Service and registry are both enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled()
    }

    pub fn is_removed(&self) -> bool {
        self.inner.lock().removed()
    }

    pub(crate) fn service(&self) -> Arc<dyn Service> {
        Arc::clone(&self.service)
    }

    pub(crate) fn dependency_edges(&self) -> &[Arc<DependencyEdge>] {
        &self.dependencies
    }

    pub(crate) fn dependency_value(&self, name: &str) -> Option<ServiceValue> {
        self.dependencies
            .iter()
            .find(|e| e.target().name().as_str() == name)
            .and_then(|e| e.value())
    }

    fn registrations(&self) -> impl Iterator<Item = &Arc<Registration>> {
        std::iter::once(&self.primary).chain(self.aliases.iter())
    }

    fn last_task(&self) -> Option<TaskHandle> {
        self.inner.lock().last_task.as_ref().and_then(WeakTaskHandle::upgrade)
    }

    // ---- facade ----

    /// Sets the service-enabled flag.
    pub fn enable(self: &Arc<Self>, txn: &Transaction) -> Result<(), ServiceError> {
        self.update_flags(txn, |f| f.insert(Flags::SERVICE_ENABLED))
    }

    /// Clears the service-enabled flag; a running service stops.
    pub fn disable(self: &Arc<Self>, txn: &Transaction) -> Result<(), ServiceError> {
        self.update_flags(txn, |f| f.remove(Flags::SERVICE_ENABLED))
    }

    /// Stops the service if needed and removes it from its registry.
    pub fn remove(self: &Arc<Self>, txn: &Transaction) -> Result<(), ServiceError> {
        self.update_flags(txn, |f| f.insert(Flags::SERVICE_REMOVED))
    }

    /// Restarts a FAILED service. Ignored in any other state.
    pub fn retry(self: &Arc<Self>, txn: &Transaction) -> Result<(), ServiceError> {
        self.restart_from(ServiceState::Failed, txn)
    }

    /// Stops and starts an UP service. Ignored in any other state.
    pub fn restart(self: &Arc<Self>, txn: &Transaction) -> Result<(), ServiceError> {
        self.restart_from(ServiceState::Up, txn)
    }

    fn update_flags(
        self: &Arc<Self>,
        txn: &Transaction,
        change: impl FnOnce(&mut Flags),
    ) -> Result<(), ServiceError> {
        txn.check_update(self.owner)?;
        self.change_flags(&Scheduler::Txn(txn), change);
        txn.add_service_validator(self.id, self.clone());
        Ok(())
    }

    fn restart_from(self: &Arc<Self>, from: ServiceState, txn: &Transaction) -> Result<(), ServiceError> {
        txn.check_update(self.owner)?;
        let action = {
            let mut g = self.inner.lock();
            g.settle_abandoned();
            if g.state != from {
                return Ok(());
            }
            g.state = ServiceState::Restarting;
            self.next_action(&mut g)
        };
        if let Some(action) = action {
            self.apply(action, &Scheduler::Txn(txn));
        }
        Ok(())
    }

    /// Applies a flag change, records how to undo it and transitions.
    pub(crate) fn change_flags(self: &Arc<Self>, sched: &Scheduler<'_>, change: impl FnOnce(&mut Flags)) {
        let (before, action) = {
            let mut g = self.inner.lock();
            if g.removed() {
                return;
            }
            let before = g.flags;
            change(&mut g.flags);
            if g.flags == before {
                return;
            }
            (before, self.next_action(&mut g))
        };
        self.record_flags(before, sched);
        if let Some(action) = action {
            self.apply(action, sched);
        }
    }

    fn record_flags(self: &Arc<Self>, before: Flags, sched: &Scheduler<'_>) {
        let me = Arc::clone(self);
        let spec = TaskSpec::new(
            format!("flags {}", self.name),
            ExecuteFn::arc(|ctx: ExecuteContext| async move { ctx.complete() }),
        )
        .with_revertible(RevertFn::arc(move |ctx: RevertContext| {
            let me = Arc::clone(&me);
            async move {
                me.restore_flags(before);
                ctx.complete();
            }
        }));
        if let Err(err) = sched.submit(spec) {
            self.schedule_failed("flag change", &err, sched);
        }
    }

    // ---- installation ----

    /// Claims every name and checks for cycles. Nothing stays claimed on error.
    pub(crate) fn begin_installation(self: &Arc<Self>) -> Result<(), ServiceError> {
        let regs: Vec<&Arc<Registration>> = self.registrations().collect();
        for (i, reg) in regs.iter().enumerate() {
            if !reg.try_claim(self) {
                for claimed in &regs[..i] {
                    claimed.release(self);
                }
                return Err(ServiceError::Duplicate {
                    name: reg.name().clone(),
                });
            }
        }
        if let Some(path) = find_cycle(self) {
            for reg in &regs {
                reg.release(self);
            }
            return Err(ServiceError::CircularDependency { path });
        }
        Ok(())
    }

    pub(crate) fn abandon_installation(self: &Arc<Self>) {
        for reg in self.registrations() {
            reg.release(self);
        }
    }

    /// Submits the install task as a top-level task of `txn`.
    pub(crate) fn submit_install(self: &Arc<Self>, txn: &Transaction) -> Result<(), TxnError> {
        let handle = txn.submit(Lifecycle::spec(self, Step::Install, &[]))?;
        self.inner.lock().last_task = Some(handle.downgrade());
        Ok(())
    }

    /// Body of the install task.
    pub(crate) fn complete_installation(self: &Arc<Self>, sched: &Scheduler<'_>) {
        let via = Via::Schedule(sched);
        for edge in &self.dependencies {
            edge.bind(via);
        }
        {
            let mut g = self.inner.lock();
            g.flags.insert(Flags::SERVICE_ENABLED);
            g.bound = true;
        }
        for reg in self.registrations() {
            reg.install(self);
        }
        self.sync_demand(via);
        tracing::debug!(target: "servicevisor", service = %self.name, demand = self.demanded_by(), "service installed");
        self.transition(sched);
    }

    /// Revert of the install task.
    pub(crate) fn revert_installation(self: &Arc<Self>) {
        {
            let mut g = self.inner.lock();
            g.flags.remove(Flags::SERVICE_ENABLED);
            g.flags.insert(Flags::SERVICE_REMOVED);
            g.state = ServiceState::Removed;
            g.value = None;
        }
        self.clear(Via::Quiet);
    }

    /// Revert of the remove task: claims the names again and rebinds edges.
    pub(crate) fn reinstall(self: &Arc<Self>) {
        for reg in self.registrations() {
            if !reg.try_claim(self) {
                tracing::warn!(target: "servicevisor", service = %self.name, name = %reg.name(), "name taken while reinstalling");
            }
        }
        {
            let mut g = self.inner.lock();
            g.unsatisfied = self.dependencies.len();
            g.flags.remove(Flags::SERVICE_REMOVED);
            g.state = ServiceState::Down;
            g.bound = true;
        }
        for edge in &self.dependencies {
            edge.bind(Via::Quiet);
        }
        for reg in self.registrations() {
            reg.install(self);
        }
        self.sync_demand(Via::Quiet);
    }

    /// Vacates the names and unbinds every edge.
    fn clear(self: &Arc<Self>, via: Via<'_>) {
        for reg in self.registrations() {
            let dependents = reg.clear(self);
            if let Via::Schedule(sched) = via {
                for dependent in dependents {
                    if !Arc::ptr_eq(&dependent, self) {
                        sched.transaction().add_service_validator(dependent.id, dependent);
                    }
                }
            }
        }
        let hooks = {
            let mut g = self.inner.lock();
            g.bound = false;
            g.demanded_by = 0;
            g.unsatisfied = self.dependencies.len();
            g.notified_up = false;
            std::mem::take(&mut g.removal_hooks)
        };
        self.sync_demand(via);
        for edge in &self.dependencies {
            edge.unbind(via);
        }
        for hook in hooks {
            hook.arrive();
        }
    }

    /// Arms `countdown` with one count, released once this controller is
    /// cleared from its registry. Does nothing if it is not installed.
    pub(crate) fn when_cleared(&self, countdown: &Arc<Countdown>) {
        let mut g = self.inner.lock();
        if g.bound {
            countdown.add();
            g.removal_hooks.push(Arc::clone(countdown));
        }
    }

    // ---- transitions ----

    fn next_action(&self, g: &mut ControllerInner) -> Option<Action> {
        g.settle_abandoned();
        match g.state {
            ServiceState::Down => {
                if g.unsatisfied == 0 && g.should_start() {
                    g.state = ServiceState::Starting;
                    Some(Action::Start)
                } else if g.removed() {
                    g.state = ServiceState::Removed;
                    Some(Action::Remove)
                } else {
                    None
                }
            }
            ServiceState::Up if g.unsatisfied > 0 || g.should_stop() => {
                g.state = ServiceState::Stopping;
                Some(Action::Stop {
                    notify_down: std::mem::take(&mut g.notified_up),
                })
            }
            ServiceState::Failed if g.unsatisfied > 0 || g.should_stop() => {
                g.state = ServiceState::Stopping;
                Some(Action::StopFailed)
            }
            ServiceState::Restarting => {
                g.state = ServiceState::Stopping;
                if g.value.is_some() {
                    Some(Action::Stop {
                        notify_down: std::mem::take(&mut g.notified_up),
                    })
                } else {
                    Some(Action::StopFailed)
                }
            }
            _ => None,
        }
    }

    fn transition(self: &Arc<Self>, sched: &Scheduler<'_>) {
        let action = self.next_action(&mut self.inner.lock());
        if let Some(action) = action {
            self.apply(action, sched);
        }
    }

    fn apply(self: &Arc<Self>, action: Action, sched: &Scheduler<'_>) {
        let (step, blockers) = match action {
            Action::Start => {
                self.publish(sched, Event::new(EventKind::ServiceStarting));
                (Step::Start, self.start_blockers(sched))
            }
            Action::Stop { notify_down } => {
                if notify_down {
                    self.notify_down(Via::Schedule(sched));
                }
                self.publish(sched, Event::new(EventKind::ServiceStopping));
                (Step::Stop, self.stop_blockers(sched))
            }
            Action::StopFailed => (Step::StopFailed, self.stop_blockers(sched)),
            Action::Remove => {
                let mut own = Vec::new();
                self.push_last_task(&mut own, sched);
                (Step::Remove, own)
            }
        };
        match sched.submit(Lifecycle::spec(self, step, &blockers)) {
            Ok(handle) => self.inner.lock().last_task = Some(handle.downgrade()),
            Err(err) => self.schedule_failed(step.as_label(), &err, sched),
        }
    }

    fn schedule_failed(&self, what: &str, err: &TxnError, sched: &Scheduler<'_>) {
        tracing::error!(target: "servicevisor", service = %self.name, error = %err, "could not schedule {what}");
        sched.transaction().add_problem(
            Problem::error(format!("service `{}`: could not schedule {what}: {err}", self.name))
                .with_source(self.name.as_arc()),
        );
    }

    fn push_last_task(&self, out: &mut Vec<TaskHandle>, sched: &Scheduler<'_>) {
        if let Some(task) = self.last_task() {
            if sched.admits(&task) && !out.contains(&task) {
                out.push(task);
            }
        }
    }

    fn start_blockers(&self, sched: &Scheduler<'_>) -> Vec<TaskHandle> {
        let mut out = Vec::new();
        self.push_last_task(&mut out, sched);
        for edge in &self.dependencies {
            if let Some(dependency) = edge.target().controller() {
                dependency.push_last_task(&mut out, sched);
            }
        }
        out
    }

    fn stop_blockers(&self, sched: &Scheduler<'_>) -> Vec<TaskHandle> {
        let mut out = Vec::new();
        self.push_last_task(&mut out, sched);
        for reg in self.registrations() {
            for dependent in reg.dependents() {
                dependent.push_last_task(&mut out, sched);
            }
        }
        out
    }

    fn notify_up(&self, via: Via<'_>) {
        for reg in self.registrations() {
            reg.service_up(via);
        }
    }

    fn notify_down(&self, via: Via<'_>) {
        for reg in self.registrations() {
            reg.service_down(via);
        }
    }

    fn publish(&self, sched: &Scheduler<'_>, ev: Event) {
        sched.transaction().publish(ev.with_service(self.name.as_arc()));
    }

    // ---- inputs ----

    /// Updates `demanded_by`. Called with the forwarding registration locked.
    pub(crate) fn count_demand(&self, rising: bool, n: usize, via: Via<'_>) -> DemandShift {
        let mut g = self.inner.lock();
        let before = g.demanded_by;
        if rising {
            g.demanded_by += n;
        } else {
            if n > before {
                tracing::error!(target: "servicevisor", service = %self.name, before, released = n, "demand released below zero");
            }
            g.demanded_by = before.saturating_sub(n);
        }
        let crossed = (before == 0) != (g.demanded_by == 0);
        let action = match via {
            Via::Schedule(_) if crossed => self.next_action(&mut g),
            _ => None,
        };
        DemandShift { rising, action }
    }

    /// Second half of a demand change: propagation and the resulting task.
    ///
    /// A rising demand reaches the dependencies before the start is scheduled;
    /// a falling one schedules the stop first, so the dependencies' stops
    /// follow it.
    pub(crate) fn settle_demand(self: &Arc<Self>, shift: DemandShift, via: Via<'_>) {
        if shift.rising {
            self.sync_demand(via);
        }
        if let (Some(action), Via::Schedule(sched)) = (shift.action, via) {
            self.apply(action, sched);
        }
        if !shift.rising {
            self.sync_demand(via);
        }
    }

    /// Brings the demand held on dependencies in line with `demands_dependencies`.
    fn sync_demand(&self, via: Via<'_>) {
        let mut demanding = self.demanding.lock();
        let want = self.inner.lock().demands_dependencies();
        if *demanding == want {
            return;
        }
        *demanding = want;
        for edge in &self.dependencies {
            if want {
                edge.demand(via);
            } else {
                edge.undemand(via);
            }
        }
    }

    pub(crate) fn dependency_satisfied(self: &Arc<Self>, via: Via<'_>) {
        let action = {
            let mut g = self.inner.lock();
            if g.unsatisfied == 0 {
                tracing::warn!(target: "servicevisor", service = %self.name, "dependency satisfied twice");
                return;
            }
            g.unsatisfied -= 1;
            match via {
                Via::Schedule(_) if g.unsatisfied == 0 => self.next_action(&mut g),
                _ => None,
            }
        };
        if let (Some(action), Via::Schedule(sched)) = (action, via) {
            self.apply(action, sched);
        }
    }

    pub(crate) fn dependency_unsatisfied(self: &Arc<Self>, via: Via<'_>) {
        let action = {
            let mut g = self.inner.lock();
            g.unsatisfied += 1;
            match via {
                Via::Schedule(_) if g.unsatisfied == 1 => self.next_action(&mut g),
                _ => None,
            }
        };
        if let (Some(action), Via::Schedule(sched)) = (action, via) {
            self.apply(action, sched);
        }
    }

    // ---- lifecycle task callbacks ----

    pub(crate) fn service_started(self: &Arc<Self>, value: ServiceValue, sched: &Scheduler<'_>) {
        let (notify, action) = {
            let mut g = self.inner.lock();
            if g.state != ServiceState::Starting {
                tracing::warn!(target: "servicevisor", service = %self.name, state = %g.state, "start completed out of order");
                return;
            }
            g.state = ServiceState::Up;
            g.value = Some(value);
            let action = self.next_action(&mut g);
            let notify = action.is_none();
            g.notified_up = notify;
            (notify, action)
        };
        self.publish(sched, Event::new(EventKind::ServiceUp));
        tracing::info!(target: "servicevisor", service = %self.name, "service up");
        if notify {
            self.notify_up(Via::Schedule(sched));
        }
        if let Some(action) = action {
            self.apply(action, sched);
        }
    }

    pub(crate) fn service_failed(self: &Arc<Self>, reason: &str, sched: &Scheduler<'_>) {
        let action = {
            let mut g = self.inner.lock();
            if g.state != ServiceState::Starting {
                return;
            }
            g.state = ServiceState::Failed;
            g.value = None;
            self.next_action(&mut g)
        };
        self.publish(
            sched,
            Event::new(EventKind::ServiceFailed)
                .with_reason(reason)
                .with_severity(Severity::Warning),
        );
        tracing::warn!(target: "servicevisor", service = %self.name, reason, "service failed to start");
        if let Some(action) = action {
            self.apply(action, sched);
        }
    }

    pub(crate) fn start_cancelled(&self) {
        let mut g = self.inner.lock();
        if g.state == ServiceState::Starting {
            g.state = ServiceState::Down;
        }
    }

    pub(crate) fn service_stopped(self: &Arc<Self>, sched: &Scheduler<'_>) {
        let action = {
            let mut g = self.inner.lock();
            if g.state != ServiceState::Stopping {
                tracing::warn!(target: "servicevisor", service = %self.name, state = %g.state, "stop completed out of order");
                return;
            }
            g.state = ServiceState::Down;
            g.value = None;
            self.next_action(&mut g)
        };
        self.publish(sched, Event::new(EventKind::ServiceDown));
        tracing::info!(target: "servicevisor", service = %self.name, "service down");
        if let Some(action) = action {
            self.apply(action, sched);
        }
    }

    pub(crate) fn service_removed(self: &Arc<Self>, sched: &Scheduler<'_>) {
        self.clear(Via::Schedule(sched));
        self.publish(sched, Event::new(EventKind::ServiceRemoved));
        tracing::info!(target: "servicevisor", service = %self.name, "service removed");
    }

    // ---- revert restores ----

    pub(crate) fn restore_down(&self) {
        let notify = {
            let mut g = self.inner.lock();
            g.state = ServiceState::Down;
            g.value = None;
            std::mem::take(&mut g.notified_up)
        };
        if notify {
            self.notify_down(Via::Quiet);
        }
    }

    pub(crate) fn restore_up(&self, value: ServiceValue) {
        let notify = {
            let mut g = self.inner.lock();
            g.state = ServiceState::Up;
            g.value = Some(value);
            !std::mem::replace(&mut g.notified_up, true)
        };
        if notify {
            self.notify_up(Via::Quiet);
        }
    }

    pub(crate) fn restore_failed(&self) {
        let mut g = self.inner.lock();
        g.state = ServiceState::Failed;
        g.value = None;
    }

    fn restore_flags(&self, flags: Flags) {
        self.inner.lock().flags = flags;
    }
}

impl Validate for ServiceController {
    fn validate(&self, report: &mut ProblemReport) {
        if self.inner.lock().state == ServiceState::Removed {
            return;
        }
        for edge in &self.dependencies {
            edge.validate(&self.name, report);
        }
    }
}

impl std::fmt::Debug for ServiceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let g = self.inner.lock();
        f.debug_struct("ServiceController")
            .field("name", &self.name)
            .field("state", &g.state)
            .field("mode", &g.mode)
            .field("demanded_by", &g.demanded_by)
            .field("unsatisfied", &g.unsatisfied)
            .finish()
    }
}
