//! Transaction tasks that drive a controller through its lifecycle.
//!
//! Each step is one task whose execute body moves the controller forward and
//! whose revert body puts it back without scheduling anything.

use std::sync::Arc;

use async_trait::async_trait;

use crate::tasks::{Executable, ExecuteContext, RevertContext, Revertible, TaskHandle, TaskSpec};

use super::controller::ServiceController;
use super::schedule::Scheduler;
use super::service::{Phase, StartContext, StopContext};
use super::status::ServiceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Install,
    Start,
    Stop,
    StopFailed,
    Remove,
}

impl Step {
    pub(crate) fn as_label(&self) -> &'static str {
        match self {
            Step::Install => "install",
            Step::Start => "start",
            Step::Stop => "stop",
            Step::StopFailed => "stop-failed",
            Step::Remove => "remove",
        }
    }
}

pub(crate) struct Lifecycle {
    controller: Arc<ServiceController>,
    step: Step,
}

impl Lifecycle {
    /// Task spec named `"<step> <service>"`, e.g. `"start db"`.
    pub(crate) fn spec(controller: &Arc<ServiceController>, step: Step, after: &[TaskHandle]) -> TaskSpec {
        let task = Arc::new(Self {
            controller: Arc::clone(controller),
            step,
        });
        TaskSpec::new(format!("{} {}", step.as_label(), controller.name()), task.clone())
            .with_revertible(task)
            .with_dependencies(after)
    }
}

#[async_trait]
impl Executable for Lifecycle {
    async fn execute(&self, ctx: ExecuteContext) {
        let c = &self.controller;
        match self.step {
            Step::Install => {
                c.complete_installation(&Scheduler::Task(&ctx));
                ctx.complete();
            }
            Step::Start => {
                if ctx.is_cancel_requested() {
                    c.start_cancelled();
                    ctx.cancelled();
                    return;
                }
                c.service()
                    .start(StartContext::new(Arc::clone(c), Phase::Execute(ctx)))
                    .await;
            }
            Step::Stop => {
                c.service()
                    .stop(StopContext::new(Arc::clone(c), Phase::Execute(ctx)))
                    .await;
            }
            Step::StopFailed => {
                c.service_stopped(&Scheduler::Task(&ctx));
                ctx.complete();
            }
            Step::Remove => {
                c.service_removed(&Scheduler::Task(&ctx));
                ctx.complete();
            }
        }
    }
}

#[async_trait]
impl Revertible for Lifecycle {
    async fn revert(&self, ctx: RevertContext) {
        let c = &self.controller;
        match self.step {
            Step::Install => {
                c.revert_installation();
                ctx.complete();
            }
            Step::Start if c.state() == ServiceState::Up => {
                c.service()
                    .stop(StopContext::new(Arc::clone(c), Phase::Revert(ctx)))
                    .await;
            }
            Step::Start => {
                c.restore_down();
                ctx.complete();
            }
            Step::Stop => {
                c.service()
                    .start(StartContext::new(Arc::clone(c), Phase::Revert(ctx)))
                    .await;
            }
            Step::StopFailed => {
                c.restore_failed();
                ctx.complete();
            }
            Step::Remove => {
                c.reinstall();
                ctx.complete();
            }
        }
    }
}
