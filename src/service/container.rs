//! Top-level owner of service registries.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{Transaction, TransactionController};
use crate::error::ServiceError;

use super::countdown::Countdown;
use super::registry::ServiceRegistry;

/// Creates registries bound to one [`TransactionController`] and removes them
/// all on shutdown. Clones share the same registries.
///
/// # Example
/// ```
/// use servicevisor::{Config, ServiceContainer, TransactionController};
///
/// # #[tokio::main(flavor = "multi_thread")]
/// # async fn main() {
/// let controller = TransactionController::new(Config::default());
/// let container = ServiceContainer::new(&controller);
///
/// let txn = controller.create_update_transaction();
/// let registry = container.new_registry(&txn).unwrap();
/// assert!(registry.is_enabled());
/// txn.prepare().await.unwrap();
/// txn.commit().unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    owner: u64,
    state: Mutex<ContainerState>,
}

struct ContainerState {
    registries: Vec<ServiceRegistry>,
    shut_down: bool,
}

impl ServiceContainer {
    pub fn new(controller: &TransactionController) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                owner: controller.id(),
                state: Mutex::new(ContainerState {
                    registries: Vec::new(),
                    shut_down: false,
                }),
            }),
        }
    }

    /// Creates an empty, enabled registry.
    ///
    /// # Errors
    /// [`ServiceError::Txn`] for a foreign, read-only or inactive transaction;
    /// [`ServiceError::RegistryRemoved`] after [`shutdown`](Self::shutdown).
    pub fn new_registry(&self, txn: &Transaction) -> Result<ServiceRegistry, ServiceError> {
        txn.check_update(self.inner.owner)?;
        let mut state = self.inner.state.lock();
        if state.shut_down {
            return Err(ServiceError::RegistryRemoved);
        }
        let registry = ServiceRegistry::new(self.inner.owner);
        state.registries.push(registry.clone());
        Ok(registry)
    }

    /// Removes every registry (and with it every service) within `txn`.
    pub fn shutdown(&self, txn: &Transaction) -> Result<(), ServiceError> {
        for registry in self.begin_shutdown(txn)? {
            registry.remove(txn)?;
        }
        Ok(())
    }

    /// Like [`shutdown`](Self::shutdown); `on_shutdown` runs once every
    /// service of every registry has been removed.
    pub fn shutdown_with<F>(&self, txn: &Transaction, on_shutdown: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&ServiceContainer) + Send + 'static,
    {
        let registries = self.begin_shutdown(txn)?;
        let container = self.clone();
        let countdown = Countdown::new(move || on_shutdown(&container));
        for registry in registries {
            countdown.add();
            let countdown = Arc::clone(&countdown);
            registry.remove_with(txn, move |_| countdown.arrive())?;
        }
        countdown.arrive();
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().shut_down
    }

    fn begin_shutdown(&self, txn: &Transaction) -> Result<Vec<ServiceRegistry>, ServiceError> {
        txn.check_update(self.inner.owner)?;
        let registries = {
            let mut state = self.inner.state.lock();
            state.shut_down = true;
            state.registries.clone()
        };
        tracing::info!(target: "servicevisor", txn = txn.id(), registries = registries.len(), "container shutting down");
        Ok(registries)
    }
}
