//! # Task specification.
//!
//! Defines [`TaskSpec`], everything the engine needs to place a task in a
//! transaction graph: a name, the execute body, an optional revert body and the
//! tasks it depends on.
//!
//! ## Rules
//! - Dependencies must belong to the same transaction.
//! - A task without a revert body reverts as a no-op.
//! - Duplicate dependency handles are collapsed.

use std::borrow::Cow;
use std::sync::Arc;

use super::handle::TaskHandle;
use super::task::{Executable, Revertible};

/// Specification for a task submitted to a transaction.
///
/// ## Example
/// ```rust
/// use servicevisor::{ExecuteContext, ExecuteFn, TaskSpec};
///
/// let spec = TaskSpec::new(
///     "noop",
///     ExecuteFn::arc(|ctx: ExecuteContext| async move { ctx.complete() }),
/// );
/// assert!(spec.dependencies().is_empty());
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    name: Cow<'static, str>,
    executable: Arc<dyn Executable>,
    revertible: Option<Arc<dyn Revertible>>,
    dependencies: Vec<TaskHandle>,
}

impl TaskSpec {
    /// Creates a spec with an execute body and no dependencies.
    pub fn new(name: impl Into<Cow<'static, str>>, executable: Arc<dyn Executable>) -> Self {
        Self {
            name: name.into(),
            executable,
            revertible: None,
            dependencies: Vec::new(),
        }
    }

    /// Returns a new spec with a revert body.
    pub fn with_revertible(mut self, revertible: Arc<dyn Revertible>) -> Self {
        self.revertible = Some(revertible);
        self
    }

    /// Returns a new spec that also depends on `task`.
    pub fn depends_on(mut self, task: &TaskHandle) -> Self {
        if !self.dependencies.contains(task) {
            self.dependencies.push(task.clone());
        }
        self
    }

    /// Returns a new spec that also depends on every task in `tasks`.
    pub fn with_dependencies<'a>(mut self, tasks: impl IntoIterator<Item = &'a TaskHandle>) -> Self {
        for task in tasks {
            self = self.depends_on(task);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[TaskHandle] {
        &self.dependencies
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Cow<'static, str>,
        Arc<dyn Executable>,
        Option<Arc<dyn Revertible>>,
        Vec<TaskHandle>,
    ) {
        (self.name, self.executable, self.revertible, self.dependencies)
    }
}
