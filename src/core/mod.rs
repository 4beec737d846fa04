//! Engine core: transactions and their task graphs.
//!
//! The public API from this module is [`TransactionController`], [`Transaction`],
//! [`Config`] and the problem-reporting types.
//!
//! Internal modules:
//! - [`graph`]: task nodes, edges and counters;
//! - [`transaction`]: submission, settlement, quiescence, revert ordering;
//! - [`runner`]: runs one execute/revert body with panic isolation;
//! - [`controller`]: shared engine state and transaction creation;
//! - [`builder`]: controller construction with subscribers.
//!
//! ## Wiring
//! ```text
//! submit(spec)
//!   └─► TaskNode (NEW, waiting_on = deps + 1)
//!         └─ all deps EXECUTED ─► runner::execute ─► body ─► ctx.complete()
//!                                                          └─► EXECUTED once children settle
//!                                                                └─► dependents / parent notified
//! prepare(): wait outstanding == 0 ─► seal ─► validators ─► PREPARED
//! abort()/rollback(): revert leaves first (no executed child or dependent left)
//! ```

mod builder;
mod config;
mod controller;
pub(crate) mod graph;
mod problem;
mod runner;
mod transaction;

pub use builder::TransactionControllerBuilder;
pub use config::Config;
pub use controller::TransactionController;
pub use problem::{Problem, ProblemReport, Severity};
pub use transaction::{Transaction, TxnKind, TxnState, Validate};
