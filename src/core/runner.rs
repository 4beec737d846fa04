//! # Run one execute or revert body.
//!
//! Both runners follow the same steps:
//! 1. Acquire the global permit (if a concurrency limit is configured)
//! 2. Build the context and keep one clone as a guard
//! 3. Run the body, catching panics
//! 4. Drop the guard: if no outcome was reported and no other clone is alive,
//!    the context's drop hook settles the task
//!
//! ## Rules
//! - A panic in `execute` fails the task with a `Critical` problem.
//! - A panic in `revert` completes the revert with a `Critical` problem, so
//!   the revert phase always terminates.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::OwnedSemaphorePermit;

use crate::subscribers::panic_message;
use crate::tasks::{ExecuteContext, RevertContext};

use super::Transaction;
use super::graph::TaskNode;
use super::problem::Problem;

/// Runs the execute body of `node`.
pub(crate) async fn execute(txn: Transaction, node: Arc<TaskNode>) {
    let _permit = acquire(&txn).await;
    let ctx = ExecuteContext::new(txn.clone(), Arc::clone(&node));
    let guard = ctx.clone();

    let fut = node.executable.execute(ctx);
    if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
        let info = panic_message(panic_err.as_ref());
        tracing::error!(txn = txn.id(), task = %node.name, %info, "execute panicked");
        guard.failed(Problem::critical(format!("execute panicked: {info}")));
    }
}

/// Runs the revert body of `node`; a task without one reverts immediately.
pub(crate) async fn revert(txn: Transaction, node: Arc<TaskNode>) {
    let Some(revertible) = node.revertible.clone() else {
        txn.finish_revert(&node, None);
        return;
    };

    let _permit = acquire(&txn).await;
    let ctx = RevertContext::new(txn.clone(), Arc::clone(&node));
    let guard = ctx.clone();

    let fut = revertible.revert(ctx);
    if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
        let info = panic_message(panic_err.as_ref());
        tracing::error!(txn = txn.id(), task = %node.name, %info, "revert panicked");
        guard.add_problem(Problem::critical(format!("revert panicked: {info}")));
        guard.complete();
    }
}

/// Waits for a global permit; a closed semaphore means "run unthrottled".
async fn acquire(txn: &Transaction) -> Option<OwnedSemaphorePermit> {
    let semaphore = txn.engine().semaphore.clone()?;
    semaphore.acquire_owned().await.ok()
}
