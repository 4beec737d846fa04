//! Per-name ownership cell.
//!
//! A registration outlives the controllers that claim it: dependents may bind
//! to a name before anything is installed there, and demand placed on the name
//! is held here and handed to whichever controller installs next.

use std::sync::Arc;

use parking_lot::Mutex;

use super::controller::ServiceController;
use super::dependency::DependencyEdge;
use super::name::ServiceName;
use super::schedule::Via;

enum Slot {
    Empty,
    /// Reserved by an installation that has not completed yet.
    Claimed(Arc<ServiceController>),
    Installed(Arc<ServiceController>),
}

impl Slot {
    fn holder(&self) -> Option<&Arc<ServiceController>> {
        match self {
            Slot::Empty => None,
            Slot::Claimed(c) | Slot::Installed(c) => Some(c),
        }
    }
}

struct RegInner {
    slot: Slot,
    incoming: Vec<Arc<DependencyEdge>>,
    demand: usize,
    up: bool,
}

pub(crate) struct Registration {
    name: ServiceName,
    inner: Mutex<RegInner>,
}

impl Registration {
    pub(crate) fn new(name: ServiceName) -> Arc<Self> {
        Arc::new(Self {
            name,
            inner: Mutex::new(RegInner {
                slot: Slot::Empty,
                incoming: Vec::new(),
                demand: 0,
                up: false,
            }),
        })
    }

    pub(crate) fn name(&self) -> &ServiceName {
        &self.name
    }

    /// Reserves the slot for `controller`. Fails if anyone holds it.
    pub(crate) fn try_claim(&self, controller: &Arc<ServiceController>) -> bool {
        let mut g = self.inner.lock();
        if g.slot.holder().is_some() {
            return false;
        }
        g.slot = Slot::Claimed(Arc::clone(controller));
        true
    }

    /// Empties the slot if `controller` holds it (claimed or installed).
    pub(crate) fn release(&self, controller: &Arc<ServiceController>) {
        let mut g = self.inner.lock();
        if g.slot.holder().is_some_and(|c| Arc::ptr_eq(c, controller)) {
            g.slot = Slot::Empty;
            g.up = false;
        }
    }

    /// Turns a claim into an installation and hands the demand held so far
    /// to the controller, in one critical section with later forwarding.
    pub(crate) fn install(&self, controller: &Arc<ServiceController>) {
        let mut g = self.inner.lock();
        match &g.slot {
            Slot::Claimed(c) if Arc::ptr_eq(c, controller) => {
                g.slot = Slot::Installed(Arc::clone(controller));
                // Seeded quietly; the installer runs the transition afterwards.
                controller.count_demand(true, g.demand, Via::Quiet);
            }
            _ => {
                tracing::warn!(target: "servicevisor", service = %self.name, "install without a matching claim");
            }
        }
    }

    /// Installed controller, if any.
    pub(crate) fn controller(&self) -> Option<Arc<ServiceController>> {
        match &self.inner.lock().slot {
            Slot::Installed(c) => Some(Arc::clone(c)),
            _ => None,
        }
    }

    /// Claiming or installed controller, if any.
    pub(crate) fn holder(&self) -> Option<Arc<ServiceController>> {
        self.inner.lock().slot.holder().cloned()
    }

    /// Controllers bound to this name through a dependency edge.
    pub(crate) fn dependents(&self) -> Vec<Arc<ServiceController>> {
        self.inner
            .lock()
            .incoming
            .iter()
            .filter_map(|e| e.dependent())
            .collect()
    }

    /// Links a dependent edge. An already running service satisfies it at once.
    pub(crate) fn add_incoming(&self, edge: &Arc<DependencyEdge>, via: Via<'_>) {
        let up = {
            let mut g = self.inner.lock();
            g.incoming.push(Arc::clone(edge));
            g.up
        };
        if up {
            edge.dependency_up(via);
        }
    }

    pub(crate) fn remove_incoming(&self, edge: &Arc<DependencyEdge>) {
        self.inner
            .lock()
            .incoming
            .retain(|e| !Arc::ptr_eq(e, edge));
    }

    pub(crate) fn add_demand(&self, via: Via<'_>) {
        let shifted = {
            let mut g = self.inner.lock();
            g.demand += 1;
            match &g.slot {
                Slot::Installed(c) => Some((Arc::clone(c), c.count_demand(true, 1, via))),
                _ => None,
            }
        };
        if let Some((c, shift)) = shifted {
            c.settle_demand(shift, via);
        }
    }

    pub(crate) fn remove_demand(&self, via: Via<'_>) {
        let shifted = {
            let mut g = self.inner.lock();
            if g.demand == 0 {
                tracing::error!(target: "servicevisor", service = %self.name, "demand released below zero");
                return;
            }
            g.demand -= 1;
            match &g.slot {
                Slot::Installed(c) => Some((Arc::clone(c), c.count_demand(false, 1, via))),
                _ => None,
            }
        };
        if let Some((c, shift)) = shifted {
            c.settle_demand(shift, via);
        }
    }

    /// Marks the name as up and satisfies every bound dependent.
    pub(crate) fn service_up(&self, via: Via<'_>) {
        let edges = {
            let mut g = self.inner.lock();
            if std::mem::replace(&mut g.up, true) {
                return;
            }
            g.incoming.clone()
        };
        for edge in edges {
            edge.dependency_up(via);
        }
    }

    pub(crate) fn service_down(&self, via: Via<'_>) {
        let edges = {
            let mut g = self.inner.lock();
            if !std::mem::replace(&mut g.up, false) {
                return;
            }
            g.incoming.clone()
        };
        for edge in edges {
            edge.dependency_down(via);
        }
    }

    /// Vacates the slot held by `controller` and returns the dependents that
    /// now point at an empty name.
    pub(crate) fn clear(&self, controller: &Arc<ServiceController>) -> Vec<Arc<ServiceController>> {
        let mut g = self.inner.lock();
        if !g.slot.holder().is_some_and(|c| Arc::ptr_eq(c, controller)) {
            return Vec::new();
        }
        g.slot = Slot::Empty;
        g.up = false;
        g.incoming.iter().filter_map(|e| e.dependent()).collect()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::service::controller::ControllerParts;
    use crate::service::mode::ServiceMode;
    use crate::service::service::{Service, StartContext};

    struct Noop;

    #[async_trait]
    impl Service for Noop {
        async fn start(&self, ctx: StartContext) {
            ctx.complete(());
        }
    }

    fn controller(reg: &Arc<Registration>) -> Arc<ServiceController> {
        ServiceController::new(ControllerParts {
            name: reg.name().clone(),
            owner: 0,
            service: Arc::new(Noop),
            mode: ServiceMode::Lazy,
            primary: Arc::clone(reg),
            aliases: Vec::new(),
            dependencies: Vec::new(),
            registry_enabled: true,
        })
    }

    #[test]
    fn slot_is_claimed_once() {
        let reg = Registration::new(ServiceName::from("db"));
        let first = controller(&reg);
        let second = controller(&reg);

        assert!(reg.try_claim(&first));
        assert!(!reg.try_claim(&second));
        assert!(reg.controller().is_none());
        assert!(reg.holder().is_some());

        reg.release(&second);
        assert!(reg.holder().is_some());
        reg.release(&first);
        assert!(reg.holder().is_none());
        assert!(reg.try_claim(&second));
    }

    #[test]
    fn demand_is_held_until_install() {
        let reg = Registration::new(ServiceName::from("db"));
        let c = controller(&reg);

        reg.add_demand(Via::Quiet);
        reg.add_demand(Via::Quiet);
        reg.remove_demand(Via::Quiet);
        assert!(reg.try_claim(&c));
        reg.install(&c);
        assert_eq!(c.demanded_by(), 1);
        assert!(reg.controller().is_some());

        // Installed: demand is forwarded.
        reg.add_demand(Via::Quiet);
        assert_eq!(c.demanded_by(), 2);

        let dependents = reg.clear(&c);
        assert!(dependents.is_empty());
        assert!(reg.controller().is_none());
    }

    #[test]
    fn release_right_after_install_reaches_the_controller() {
        let reg = Registration::new(ServiceName::from("db"));
        let c = controller(&reg);

        reg.add_demand(Via::Quiet);
        assert!(reg.try_claim(&c));
        reg.install(&c);
        reg.remove_demand(Via::Quiet);
        assert_eq!(c.demanded_by(), 0);

        reg.add_demand(Via::Quiet);
        reg.add_demand(Via::Quiet);
        reg.remove_demand(Via::Quiet);
        assert_eq!(c.demanded_by(), 1);
    }

    #[test]
    fn threads_racing_on_one_name_keep_the_count() {
        let reg = Registration::new(ServiceName::from("db"));
        let c = controller(&reg);
        for _ in 0..8 {
            reg.add_demand(Via::Quiet);
        }

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        reg.add_demand(Via::Quiet);
                        reg.remove_demand(Via::Quiet);
                    }
                    if i % 2 == 0 {
                        reg.remove_demand(Via::Quiet);
                    }
                })
            })
            .collect();
        assert!(reg.try_claim(&c));
        reg.install(&c);
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(c.demanded_by(), 4);
    }
}
