//! # servicevisor
//!
//! **Servicevisor** is a transactional service runtime for Rust.
//!
//! It installs, starts, stops and removes named *services* that depend on
//! each other. Every change happens inside a transaction executed by a
//! concurrent task engine: the transaction either commits as a whole or is
//! rolled back in strict reverse order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  caller
//!    │ create_update_transaction()
//!    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TransactionController                                            │
//! │  - Engine (config, semaphore, runtime handle)                     │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        ▼
//! ┌──────────────┐  submit   ┌──────────────────────────────────────┐
//! │ Transaction  │ ────────► │ task graph (parent/child, deps)      │
//! │ prepare      │           │   runner: execute / revert bodies    │
//! │ commit       │ ◄──────── │   on the Tokio runtime               │
//! │ abort        │  settled  └──────────────────────────────────────┘
//! │ rollback     │                       ▲
//! └──────────────┘                       │ lifecycle tasks
//!                                        │ (install/start/stop/remove)
//! ┌───────────────────────────────────────┴───────────────────────────┐
//! │ ServiceContainer ─► ServiceRegistry ─► ServiceController (FSM)    │
//! │                      names, demand,     state, flags, counters    │
//! │                      dependency edges                             │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Transaction phases
//! ```text
//! ACTIVE ──prepare──► PREPARED ──commit──► COMMITTED
//!   │                    │
//!   │                    └──abort──► ABORTED      (every executed task reverted)
//!   └──rollback──► ROLLED_BACK                    (every executed task reverted)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Transactions**  | Group work into atomic, revertible units.                    | [`TransactionController`], [`Transaction`]  |
//! | **Tasks**         | Async bodies with parent/child and dependency ordering.      | [`Executable`], [`Revertible`], [`TaskSpec`]|
//! | **Services**      | Named services with dependencies, demand and modes.          | [`Service`], [`ServiceRegistry`]            |
//! | **Problems**      | Severity-ranked problems collected instead of thrown.        | [`Problem`], [`ProblemReport`]              |
//! | **Subscriber API**| Hook into task, transaction and service events.              | [`Subscribe`]                               |
//! | **Errors**        | Typed errors for misuse and installation failures.           | [`TxnError`], [`ServiceError`]              |
//! | **Configuration** | Concurrency cap, bus capacity, commit threshold.             | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use servicevisor::{
//!     Config, ServiceBuilder, ServiceContainer, ServiceMode, ServiceState, Service,
//!     StartContext, TransactionController,
//! };
//!
//! struct Db;
//!
//! #[async_trait]
//! impl Service for Db {
//!     async fn start(&self, ctx: StartContext) {
//!         ctx.complete(String::from("postgres://localhost"));
//!     }
//! }
//!
//! struct Api;
//!
//! #[async_trait]
//! impl Service for Api {
//!     async fn start(&self, ctx: StartContext) {
//!         match ctx.dependency_as::<String>("db") {
//!             Some(url) => ctx.complete(format!("api on {url}")),
//!             None => ctx.fail("db is not up"),
//!         }
//!     }
//! }
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = TransactionController::new(Config::default());
//!     let container = ServiceContainer::new(&controller);
//!
//!     let txn = controller.create_update_transaction();
//!     let registry = container.new_registry(&txn)?;
//!     registry.install(&txn, ServiceBuilder::new("db", Db).with_mode(ServiceMode::OnDemand))?;
//!     let api = registry.install(&txn, ServiceBuilder::new("api", Api).requires("db"))?;
//!
//!     txn.prepare().await?;
//!     txn.commit()?;
//!
//!     assert_eq!(api.state(), ServiceState::Up);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod service;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use crate::core::{
    Config, Problem, ProblemReport, Severity, Transaction, TransactionController,
    TransactionControllerBuilder, TxnKind, TxnState, Validate,
};
pub use error::{DependencyError, ServiceError, TxnError};
pub use events::{Event, EventKind};
pub use service::{
    Dependency, DependencyFlag, Service, ServiceBuilder, ServiceContainer, ServiceController,
    ServiceMode, ServiceName, ServiceRegistry, ServiceState, ServiceValue, StartContext,
    StopContext,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    Executable, ExecuteContext, ExecuteFn, RevertContext, RevertFn, Revertible, TaskHandle,
    TaskSpec, TaskState,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
