//! # Executable and revertible task bodies.
//!
//! A task is a pair of bodies: [`Executable`] does the work, [`Revertible`]
//! undoes it. Neither returns a result. Each body reports its outcome through
//! the context it receives (`complete`, `cancelled`, `failed`), which may happen
//! after the body's future returned (for example from a spawned future that
//! holds a clone of the context).
//!
//! ## Rules
//! - Exactly one outcome counts; later reports are ignored.
//! - Dropping every clone of a context without reporting fails the task
//!   (execute) or completes the revert with a warning problem.
//! - A panic inside a body is caught; the task becomes `Failed`.

use async_trait::async_trait;

use super::context::{ExecuteContext, RevertContext};

/// # Work performed while a transaction executes.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use servicevisor::{Executable, ExecuteContext};
///
/// struct Migrate;
///
/// #[async_trait]
/// impl Executable for Migrate {
///     async fn execute(&self, ctx: ExecuteContext) {
///         if ctx.is_cancel_requested() {
///             ctx.cancelled();
///             return;
///         }
///         // apply the migration...
///         ctx.complete();
///     }
/// }
/// ```
#[async_trait]
pub trait Executable: Send + Sync + 'static {
    /// Runs the task body. Must eventually report through `ctx`.
    async fn execute(&self, ctx: ExecuteContext);
}

/// # Undo step for an executed task.
///
/// Called only for tasks that reached `Executed`, after every executed child
/// and every executed dependent has been reverted.
#[async_trait]
pub trait Revertible: Send + Sync + 'static {
    /// Reverts the task's effects. Must eventually call `ctx.complete()`.
    async fn revert(&self, ctx: RevertContext);
}
