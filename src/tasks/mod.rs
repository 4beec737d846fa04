//! # Task abstractions.
//!
//! This module provides the user-facing side of the task engine:
//! - [`Executable`], [`Revertible`] - async bodies of a task
//! - [`ExecuteFn`], [`RevertFn`] - closure-backed bodies
//! - [`TaskSpec`] - name, bodies and dependencies of a task
//! - [`ExecuteContext`], [`RevertContext`] - outcome reporting and child submission
//! - [`TaskHandle`], [`TaskState`] - references to submitted tasks

mod context;
mod handle;
mod spec;
mod task;
mod task_fn;

pub use context::{ExecuteContext, RevertContext};
pub(crate) use handle::WeakTaskHandle;
pub use handle::{TaskHandle, TaskState};
pub use spec::TaskSpec;
pub use task::{Executable, Revertible};
pub use task_fn::{ExecuteFn, RevertFn};
