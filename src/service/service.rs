//! # User-supplied service bodies.
//!
//! A [`Service`] is started and stopped by its controller from inside
//! transaction tasks. Both hooks receive a context that must be finished
//! exactly once: [`StartContext::complete`] / [`StartContext::fail`] or
//! [`StopContext::complete`]. Contexts are consumed by the finishing call; a
//! context dropped unfinished counts as a failed start or a completed stop.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Problem;
use crate::tasks::{ExecuteContext, RevertContext};

use super::controller::ServiceController;
use super::name::ServiceName;
use super::schedule::Scheduler;

/// Value published by a running service and handed to its dependents.
pub type ServiceValue = Arc<dyn Any + Send + Sync>;

/// # Start/stop hooks of a service.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use servicevisor::{Service, StartContext};
///
/// struct Pool { size: usize }
///
/// #[async_trait]
/// impl Service for Pool {
///     async fn start(&self, ctx: StartContext) {
///         if self.size == 0 {
///             ctx.fail("empty pool");
///         } else {
///             ctx.complete(self.size);
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Brings the service up. Finish with `complete(value)` or `fail(reason)`.
    async fn start(&self, ctx: StartContext);

    /// Takes the service down. The default completes immediately.
    async fn stop(&self, ctx: StopContext) {
        ctx.complete();
    }
}

/// Which task phase a lifecycle context belongs to.
pub(crate) enum Phase {
    Execute(ExecuteContext),
    Revert(RevertContext),
}

/// Passed to [`Service::start`].
pub struct StartContext {
    controller: Arc<ServiceController>,
    phase: Phase,
    finished: bool,
}

impl StartContext {
    pub(crate) fn new(controller: Arc<ServiceController>, phase: Phase) -> Self {
        Self {
            controller,
            phase,
            finished: false,
        }
    }

    /// Name of the service being started.
    pub fn name(&self) -> &ServiceName {
        self.controller.name()
    }

    /// True once the owning transaction was asked to roll back.
    pub fn is_cancel_requested(&self) -> bool {
        match &self.phase {
            Phase::Execute(ctx) => ctx.is_cancel_requested(),
            Phase::Revert(ctx) => ctx.transaction().is_cancel_requested(),
        }
    }

    /// Value of the dependency declared under `name`, if it is up.
    pub fn dependency(&self, name: &str) -> Option<ServiceValue> {
        self.controller.dependency_value(name)
    }

    /// Typed variant of [`dependency`](Self::dependency).
    pub fn dependency_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.dependency(name)?.downcast::<T>().ok()
    }

    /// Reports a successful start with the service's value.
    pub fn complete<T: Any + Send + Sync>(self, value: T) {
        self.complete_with(Arc::new(value));
    }

    /// Reports a successful start with an already shared value.
    pub fn complete_with(mut self, value: ServiceValue) {
        self.finished = true;
        match &self.phase {
            Phase::Execute(ctx) => {
                self.controller.service_started(value, &Scheduler::Task(ctx));
                ctx.complete();
            }
            Phase::Revert(ctx) => {
                self.controller.restore_up(value);
                ctx.complete();
            }
        }
    }

    /// Reports a failed start. The service moves to FAILED; the transaction continues.
    pub fn fail(mut self, reason: impl Into<String>) {
        self.finished = true;
        self.report_failure(&reason.into());
    }

    fn report_failure(&self, reason: &str) {
        let problem = Problem::warning(format!(
            "service `{}` failed to start: {reason}",
            self.controller.name()
        ))
        .with_source(self.controller.name().as_arc());
        match &self.phase {
            Phase::Execute(ctx) => {
                ctx.add_problem(problem);
                self.controller.service_failed(reason, &Scheduler::Task(ctx));
                ctx.complete();
            }
            Phase::Revert(ctx) => {
                ctx.add_problem(problem);
                self.controller.restore_failed();
                ctx.complete();
            }
        }
    }
}

impl Drop for StartContext {
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            self.report_failure("start context dropped without completion");
        }
    }
}

/// Passed to [`Service::stop`].
pub struct StopContext {
    controller: Arc<ServiceController>,
    phase: Phase,
    finished: bool,
}

impl StopContext {
    pub(crate) fn new(controller: Arc<ServiceController>, phase: Phase) -> Self {
        Self {
            controller,
            phase,
            finished: false,
        }
    }

    pub fn name(&self) -> &ServiceName {
        self.controller.name()
    }

    /// Reports that the service is down.
    pub fn complete(mut self) {
        self.finished = true;
        self.finish();
    }

    fn finish(&self) {
        match &self.phase {
            Phase::Execute(ctx) => {
                self.controller.service_stopped(&Scheduler::Task(ctx));
                ctx.complete();
            }
            Phase::Revert(ctx) => {
                self.controller.restore_down();
                ctx.complete();
            }
        }
    }
}

impl Drop for StopContext {
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            tracing::warn!(target: "servicevisor", service = %self.controller.name(), "stop context dropped without completion");
            self.finish();
        }
    }
}
