//! # Service layer.
//!
//! Named services with dependencies, driven through the transaction engine.
//!
//! ```text
//! ServiceContainer ─► ServiceRegistry ─► Registration (per name) ─► ServiceController
//!                                              ▲                          │
//!                                              └──── DependencyEdge ◄─────┘
//! ```
//!
//! - [`ServiceRegistry::install`] claims names, checks for cycles and submits
//!   the install task.
//! - Each [`ServiceController`] turns flag, demand and dependency changes
//!   into start/stop/remove tasks of the transaction that caused them.

mod builder;
mod container;
mod controller;
mod countdown;
mod cycle;
mod dependency;
mod lifecycle;
mod mode;
mod name;
mod registration;
mod registry;
mod schedule;
mod service;
mod status;

pub use builder::ServiceBuilder;
pub use container::ServiceContainer;
pub use controller::ServiceController;
pub use dependency::{Dependency, DependencyFlag};
pub use mode::ServiceMode;
pub use name::ServiceName;
pub use registry::ServiceRegistry;
pub use service::{Service, ServiceValue, StartContext, StopContext};
pub use status::ServiceState;
