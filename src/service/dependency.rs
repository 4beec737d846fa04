//! # Dependencies between services.
//!
//! A [`Dependency`] is the declaration ("`api` needs `db`"); a
//! [`DependencyEdge`] is the live link between a dependent controller and the
//! registration of the name it depends on.
//!
//! ## Flags
//! | Flag         | Effect                                                        |
//! |--------------|---------------------------------------------------------------|
//! | `Required`   | default; missing target is an ERROR at prepare                |
//! | `Unrequired` | missing target is tolerated                                   |
//! | `Demanded`   | target is demanded for as long as the edge is bound           |
//! | `Undemanded` | target is never demanded through this edge                    |
//!
//! `Required`/`Unrequired` and `Demanded`/`Undemanded` are mutually exclusive.
//! Dynamic demand (from an `Active` dependent, or a demanded `Lazy`/`OnDemand`
//! one) flows through an edge only when neither demand flag is set.

use std::sync::{Arc, Weak};

use crate::core::{Problem, ProblemReport};
use crate::error::DependencyError;

use super::controller::ServiceController;
use super::name::ServiceName;
use super::registration::Registration;
use super::schedule::Via;
use super::service::ServiceValue;

/// Behavior modifiers for a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyFlag {
    Required,
    Unrequired,
    Demanded,
    Undemanded,
}

impl DependencyFlag {
    const fn bit(self) -> u8 {
        match self {
            DependencyFlag::Required => 1,
            DependencyFlag::Unrequired => 1 << 1,
            DependencyFlag::Demanded => 1 << 2,
            DependencyFlag::Undemanded => 1 << 3,
        }
    }
}

const EXCLUSIVE_PAIRS: [(DependencyFlag, DependencyFlag); 2] = [
    (DependencyFlag::Required, DependencyFlag::Unrequired),
    (DependencyFlag::Demanded, DependencyFlag::Undemanded),
];

/// Declared dependency on another service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    name: ServiceName,
    flags: u8,
}

impl Dependency {
    /// Creates a dependency with explicit flags.
    ///
    /// # Errors
    /// [`DependencyError::MutuallyExclusiveFlags`] if both flags of a pair are given.
    ///
    /// # Example
    /// ```
    /// use servicevisor::{Dependency, DependencyFlag};
    ///
    /// let dep = Dependency::new("db", &[DependencyFlag::Demanded]).unwrap();
    /// assert!(dep.has(DependencyFlag::Demanded));
    ///
    /// let err = Dependency::new("db", &[DependencyFlag::Required, DependencyFlag::Unrequired]);
    /// assert!(err.is_err());
    /// ```
    pub fn new(
        name: impl Into<ServiceName>,
        flags: &[DependencyFlag],
    ) -> Result<Self, DependencyError> {
        let bits = flags.iter().fold(0u8, |acc, f| acc | f.bit());
        for (first, second) in EXCLUSIVE_PAIRS {
            if bits & first.bit() != 0 && bits & second.bit() != 0 {
                return Err(DependencyError::MutuallyExclusiveFlags { first, second });
            }
        }
        Ok(Self {
            name: name.into(),
            flags: bits,
        })
    }

    /// Plain required dependency.
    pub fn on(name: impl Into<ServiceName>) -> Self {
        Self {
            name: name.into(),
            flags: 0,
        }
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn has(&self, flag: DependencyFlag) -> bool {
        self.flags & flag.bit() != 0
    }

    fn pins_demand(&self) -> bool {
        self.has(DependencyFlag::Demanded) || self.has(DependencyFlag::Undemanded)
    }
}

/// Live dependency link owned by the dependent controller.
pub(crate) struct DependencyEdge {
    spec: Dependency,
    target: Arc<Registration>,
    dependent: Weak<ServiceController>,
}

impl DependencyEdge {
    pub(crate) fn new(
        spec: Dependency,
        target: Arc<Registration>,
        dependent: Weak<ServiceController>,
    ) -> Self {
        Self {
            spec,
            target,
            dependent,
        }
    }

    pub(crate) fn target(&self) -> &Arc<Registration> {
        &self.target
    }

    pub(crate) fn dependent(&self) -> Option<Arc<ServiceController>> {
        self.dependent.upgrade()
    }

    /// Links the edge into the target registration (and pins demand if `Demanded`).
    pub(crate) fn bind(self: &Arc<Self>, via: Via<'_>) {
        self.target.add_incoming(self, via);
        if self.spec.has(DependencyFlag::Demanded) {
            self.target.add_demand(via);
        }
    }

    pub(crate) fn unbind(self: &Arc<Self>, via: Via<'_>) {
        self.target.remove_incoming(self);
        if self.spec.has(DependencyFlag::Demanded) {
            self.target.remove_demand(via);
        }
    }

    pub(crate) fn demand(&self, via: Via<'_>) {
        if !self.spec.pins_demand() {
            self.target.add_demand(via);
        }
    }

    pub(crate) fn undemand(&self, via: Via<'_>) {
        if !self.spec.pins_demand() {
            self.target.remove_demand(via);
        }
    }

    pub(crate) fn dependency_up(&self, via: Via<'_>) {
        if let Some(dependent) = self.dependent() {
            dependent.dependency_satisfied(via);
        }
    }

    pub(crate) fn dependency_down(&self, via: Via<'_>) {
        if let Some(dependent) = self.dependent() {
            dependent.dependency_unsatisfied(via);
        }
    }

    /// Value of the target service, if it is installed and up.
    pub(crate) fn value(&self) -> Option<ServiceValue> {
        self.target.controller().and_then(|c| c.value())
    }

    pub(crate) fn validate(&self, dependent: &ServiceName, report: &mut ProblemReport) {
        if self.target.holder().is_none() && !self.spec.has(DependencyFlag::Unrequired) {
            report.add(
                Problem::error(format!(
                    "service `{dependent}` requires `{}`, which is not installed",
                    self.target.name()
                ))
                .with_source(dependent.as_arc()),
            );
        }
    }
}
