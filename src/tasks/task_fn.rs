//! # Function-backed task bodies (`ExecuteFn`, `RevertFn`)
//!
//! Wrap a closure `F: Fn(Context) -> Fut` into an [`Executable`] or
//! [`Revertible`], producing a fresh future per invocation.
//!
//! ## Example
//! ```rust
//! use servicevisor::{ExecuteContext, ExecuteFn, RevertContext, RevertFn, TaskSpec};
//!
//! let spec = TaskSpec::new(
//!     "write marker",
//!     ExecuteFn::arc(|ctx: ExecuteContext| async move { ctx.complete() }),
//! )
//! .with_revertible(RevertFn::arc(|ctx: RevertContext| async move { ctx.complete() }));
//!
//! assert_eq!(spec.name(), "write marker");
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::{ExecuteContext, RevertContext};
use super::task::{Executable, Revertible};

/// Closure-backed [`Executable`].
#[derive(Debug)]
pub struct ExecuteFn<F> {
    f: F,
}

impl<F> ExecuteFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the body and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Executable for ExecuteFn<F>
where
    F: Fn(ExecuteContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn execute(&self, ctx: ExecuteContext) {
        (self.f)(ctx).await
    }
}

/// Closure-backed [`Revertible`].
#[derive(Debug)]
pub struct RevertFn<F> {
    f: F,
}

impl<F> RevertFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the body and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Revertible for RevertFn<F>
where
    F: Fn(RevertContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn revert(&self, ctx: RevertContext) {
        (self.f)(ctx).await
    }
}
