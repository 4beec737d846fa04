//! Error types used by the transaction engine and the service layer.
//!
//! This module defines three error enums:
//!
//! - [`TxnError`] — misuse of a transaction or a task graph (wrong owner, wrong phase, bad dependency).
//! - [`DependencyError`] — a dependency declaration that can never be valid.
//! - [`ServiceError`] — failures of service installation and lookup.
//!
//! All of them provide `as_label` for logs/metrics. Installation errors are raised
//! synchronously, before any new state becomes visible to other threads.

use thiserror::Error;

use crate::core::{Severity, TxnState};
use crate::service::{DependencyFlag, ServiceName};

/// # Errors produced by transactions and the task graph.
///
/// [`TxnError::ForeignTransaction`] is the argument error raised when a transaction
/// is handed to a controller or registry it does not belong to. [`TxnError::InvalidState`]
/// is the state error raised when the transaction is no longer able to accept the call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxnError {
    /// Transaction was created by a different transaction controller.
    #[error("transaction {txn} was created by another controller")]
    ForeignTransaction {
        /// Offending transaction id.
        txn: u64,
    },

    /// Transaction is in a state that does not allow this operation.
    #[error("transaction {txn} is {state}; operation requires {expected}")]
    InvalidState {
        /// Transaction id.
        txn: u64,
        /// Observed state.
        state: TxnState,
        /// Human-readable requirement.
        expected: &'static str,
    },

    /// Mutation attempted through a read-only transaction.
    #[error("transaction {txn} is read-only")]
    ReadOnly {
        /// Transaction id.
        txn: u64,
    },

    /// Another phase operation (prepare/rollback/abort/commit) is running.
    #[error("transaction {txn} is busy with another phase operation")]
    Busy {
        /// Transaction id.
        txn: u64,
    },

    /// Validation recorded problems at or above the commit threshold.
    #[error("commit blocked by {count} problem(s) at or above {severity}")]
    CommitBlocked {
        /// Threshold that was reached.
        severity: Severity,
        /// Number of blocking problems.
        count: usize,
    },

    /// Dependency task belongs to a different transaction.
    #[error("dependency `{task}` belongs to another transaction")]
    ForeignDependency {
        /// Dependency task name.
        task: String,
    },

    /// Dependency task can never be satisfied by the new task.
    #[error("invalid dependency on `{task}`: {reason}")]
    InvalidDependency {
        /// Dependency task name.
        task: String,
        /// Why the edge is rejected.
        reason: &'static str,
    },

    /// Child submitted after the parent reported its own outcome.
    #[error("task `{task}` already reported its outcome")]
    TaskClosed {
        /// Parent task name.
        task: String,
    },
}

impl TxnError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use servicevisor::TxnError;
    ///
    /// let err = TxnError::ReadOnly { txn: 7 };
    /// assert_eq!(err.as_label(), "txn_read_only");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TxnError::ForeignTransaction { .. } => "txn_foreign",
            TxnError::InvalidState { .. } => "txn_invalid_state",
            TxnError::ReadOnly { .. } => "txn_read_only",
            TxnError::Busy { .. } => "txn_busy",
            TxnError::CommitBlocked { .. } => "txn_commit_blocked",
            TxnError::ForeignDependency { .. } => "task_foreign_dependency",
            TxnError::InvalidDependency { .. } => "task_invalid_dependency",
            TxnError::TaskClosed { .. } => "task_closed",
        }
    }

    /// True for argument errors (the caller passed something that can never work).
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            TxnError::ForeignTransaction { .. }
                | TxnError::ForeignDependency { .. }
                | TxnError::InvalidDependency { .. }
        )
    }
}

/// # Errors produced while declaring a dependency.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// Two flags of a mutually exclusive pair were given together.
    #[error("dependency flags {first:?} and {second:?} are mutually exclusive")]
    MutuallyExclusiveFlags {
        /// First flag of the pair.
        first: DependencyFlag,
        /// Second flag of the pair.
        second: DependencyFlag,
    },
}

impl DependencyError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DependencyError::MutuallyExclusiveFlags { .. } => "dependency_exclusive_flags",
        }
    }
}

/// # Errors produced by the service layer.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Name (primary or alias) is already owned by another controller.
    #[error("service `{name}` is already installed")]
    Duplicate {
        /// Conflicting name.
        name: ServiceName,
    },

    /// Installation would close a dependency cycle.
    #[error("circular dependency: {}", display_path(.path))]
    CircularDependency {
        /// Names along the cycle, first name repeated at the end.
        path: Vec<ServiceName>,
    },

    /// No installed service under this name.
    #[error("service `{name}` not found")]
    NotFound {
        /// Requested name.
        name: ServiceName,
    },

    /// Registry was removed; it accepts no further installations.
    #[error("registry has been removed")]
    RegistryRemoved,

    /// Transaction misuse.
    #[error(transparent)]
    Txn(#[from] TxnError),

    /// Invalid dependency declaration.
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use servicevisor::{ServiceError, ServiceName};
    ///
    /// let err = ServiceError::Duplicate { name: ServiceName::from("db") };
    /// assert_eq!(err.as_label(), "service_duplicate");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Duplicate { .. } => "service_duplicate",
            ServiceError::CircularDependency { .. } => "service_circular_dependency",
            ServiceError::NotFound { .. } => "service_not_found",
            ServiceError::RegistryRemoved => "registry_removed",
            ServiceError::Txn(e) => e.as_label(),
            ServiceError::Dependency(e) => e.as_label(),
        }
    }
}

fn display_path(path: &[ServiceName]) -> String {
    path.iter()
        .map(ServiceName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
