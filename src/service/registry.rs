//! # Service registry.
//!
//! A registry maps service names to [`Registration`]s and installs new
//! services into them. Registrations are created on first mention (by an
//! install or by a dependency on the name) and live as long as the registry.
//!
//! ## Rules
//! - `install` is all-or-nothing: a duplicate name or a dependency cycle is
//!   reported before any new state is visible.
//! - `enable`/`disable` toggle the registry-enabled flag of every installed
//!   service; `remove` removes every service and refuses further installs.
//! - `remove_with` also takes a callback, run once the last of those services
//!   has been removed (on whichever thread removes it).

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::core::Transaction;
use crate::error::ServiceError;
use crate::tasks::{ExecuteContext, ExecuteFn, RevertContext, RevertFn, TaskSpec};

use super::builder::ServiceBuilder;
use super::controller::{ControllerParts, ServiceController};
use super::countdown::Countdown;
use super::name::ServiceName;
use super::registration::Registration;
use super::schedule::Scheduler;
use super::status::Flags;

#[derive(Clone, Copy)]
struct RegistryFlags {
    enabled: bool,
    removed: bool,
}

struct RegistryInner {
    owner: u64,
    registrations: DashMap<ServiceName, Arc<Registration>>,
    flags: Mutex<RegistryFlags>,
}

/// Cloneable handle to one registry.
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

impl ServiceRegistry {
    pub(crate) fn new(owner: u64) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                owner,
                registrations: DashMap::new(),
                flags: Mutex::new(RegistryFlags {
                    enabled: true,
                    removed: false,
                }),
            }),
        }
    }

    /// Installs a service described by `builder`.
    ///
    /// # Errors
    /// - [`ServiceError::Txn`] if `txn` is foreign, read-only or no longer active.
    /// - [`ServiceError::RegistryRemoved`] after [`remove`](Self::remove).
    /// - [`ServiceError::Duplicate`] if the name or an alias is taken.
    /// - [`ServiceError::CircularDependency`] if the dependencies close a cycle.
    pub fn install(
        &self,
        txn: &Transaction,
        builder: ServiceBuilder,
    ) -> Result<Arc<ServiceController>, ServiceError> {
        txn.check_update(self.inner.owner)?;
        let registry_enabled = {
            let flags = self.inner.flags.lock();
            if flags.removed {
                return Err(ServiceError::RegistryRemoved);
            }
            flags.enabled
        };

        let ServiceBuilder {
            name,
            aliases,
            mode,
            dependencies,
            service,
        } = builder;
        let controller = ServiceController::new(ControllerParts {
            primary: self.registration(&name),
            aliases: aliases.iter().map(|a| self.registration(a)).collect(),
            dependencies: dependencies
                .into_iter()
                .map(|dep| {
                    let target = self.registration(dep.name());
                    (dep, target)
                })
                .collect(),
            name,
            owner: self.inner.owner,
            service,
            mode,
            registry_enabled,
        });

        controller.begin_installation()?;
        if let Err(err) = controller.submit_install(txn) {
            controller.abandon_installation();
            return Err(err.into());
        }
        txn.add_service_validator(controller.id(), controller.clone());
        tracing::debug!(target: "servicevisor", txn = txn.id(), service = %controller.name(), "install submitted");
        Ok(controller)
    }

    /// Installed service under `name` (primary or alias).
    pub fn get_service(&self, name: impl AsRef<str>) -> Option<Arc<ServiceController>> {
        let reg = self.inner.registrations.get(name.as_ref())?.value().clone();
        reg.controller()
    }

    /// Like [`get_service`](Self::get_service) but fails with [`ServiceError::NotFound`].
    pub fn get_required_service(
        &self,
        name: impl AsRef<str>,
    ) -> Result<Arc<ServiceController>, ServiceError> {
        let name = name.as_ref();
        self.get_service(name).ok_or_else(|| ServiceError::NotFound {
            name: ServiceName::from(name),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.flags.lock().enabled
    }

    pub fn is_removed(&self) -> bool {
        self.inner.flags.lock().removed
    }

    /// Enables every service of this registry.
    pub fn enable(&self, txn: &Transaction) -> Result<(), ServiceError> {
        self.update(txn, |flags| flags.enabled = true)
    }

    /// Disables every service of this registry; running services stop.
    pub fn disable(&self, txn: &Transaction) -> Result<(), ServiceError> {
        self.update(txn, |flags| flags.enabled = false)
    }

    /// Removes every service and rejects further installs.
    pub fn remove(&self, txn: &Transaction) -> Result<(), ServiceError> {
        self.update(txn, |flags| {
            flags.enabled = false;
            flags.removed = true;
        })
    }

    /// Like [`remove`](Self::remove), then calls `on_removed` once every
    /// service of this registry reached [`Removed`](crate::ServiceState::Removed).
    ///
    /// The callback runs right away if nothing is installed. It is never
    /// called if the removal is rolled back before it finishes.
    pub fn remove_with<F>(&self, txn: &Transaction, on_removed: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&ServiceRegistry) + Send + 'static,
    {
        self.remove(txn)?;
        let registry = self.clone();
        let countdown = Countdown::new(move || on_removed(&registry));
        for controller in self.controllers() {
            controller.when_cleared(&countdown);
        }
        countdown.arrive();
        Ok(())
    }

    fn update(
        &self,
        txn: &Transaction,
        change: impl FnOnce(&mut RegistryFlags),
    ) -> Result<(), ServiceError> {
        txn.check_update(self.inner.owner)?;
        let (before, after) = {
            let mut flags = self.inner.flags.lock();
            if flags.removed {
                return Ok(());
            }
            let before = *flags;
            change(&mut flags);
            (before, *flags)
        };
        self.record(txn, before)?;

        let sched = Scheduler::Txn(txn);
        for controller in self.controllers() {
            if after.removed {
                controller.remove(txn)?;
            } else {
                controller.change_flags(&sched, |f| f.set(Flags::REGISTRY_ENABLED, after.enabled));
                txn.add_service_validator(controller.id(), controller.clone());
            }
        }
        Ok(())
    }

    /// Submits a no-op task whose revert restores the registry flags.
    fn record(&self, txn: &Transaction, before: RegistryFlags) -> Result<(), ServiceError> {
        let inner = Arc::clone(&self.inner);
        let spec = TaskSpec::new(
            "registry flags",
            ExecuteFn::arc(|ctx: ExecuteContext| async move { ctx.complete() }),
        )
        .with_revertible(RevertFn::arc(move |ctx: RevertContext| {
            let inner = Arc::clone(&inner);
            async move {
                *inner.flags.lock() = before;
                ctx.complete();
            }
        }));
        txn.submit(spec)?;
        Ok(())
    }

    /// Installed controllers, each listed once.
    fn controllers(&self) -> Vec<Arc<ServiceController>> {
        let regs: Vec<Arc<Registration>> = self
            .inner
            .registrations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut seen = HashSet::new();
        regs.iter()
            .filter_map(|reg| reg.controller())
            .filter(|c| seen.insert(c.id()))
            .collect()
    }

    fn registration(&self, name: &ServiceName) -> Arc<Registration> {
        self.inner
            .registrations
            .entry(name.clone())
            .or_insert_with(|| Registration::new(name.clone()))
            .value()
            .clone()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = *self.inner.flags.lock();
        f.debug_struct("ServiceRegistry")
            .field("names", &self.inner.registrations.len())
            .field("enabled", &flags.enabled)
            .field("removed", &flags.removed)
            .finish()
    }
}
