//! Declarative description of a service to install.

use std::sync::Arc;

use super::dependency::Dependency;
use super::mode::ServiceMode;
use super::name::ServiceName;
use super::service::Service;

/// # Builder for one service installation.
///
/// Nothing happens until the builder is handed to
/// [`ServiceRegistry::install`](crate::ServiceRegistry::install).
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use servicevisor::{Dependency, DependencyFlag, ServiceBuilder, ServiceMode, Service, StartContext};
///
/// struct Api;
///
/// #[async_trait]
/// impl Service for Api {
///     async fn start(&self, ctx: StartContext) {
///         ctx.complete(());
///     }
/// }
///
/// let builder = ServiceBuilder::new("api", Api)
///     .with_alias("http")
///     .with_mode(ServiceMode::Lazy)
///     .requires("db")
///     .with_dependency(Dependency::new("cache", &[DependencyFlag::Unrequired]).unwrap());
///
/// assert_eq!(builder.name().as_str(), "api");
/// assert_eq!(builder.dependencies().len(), 2);
/// ```
pub struct ServiceBuilder {
    pub(crate) name: ServiceName,
    pub(crate) aliases: Vec<ServiceName>,
    pub(crate) mode: ServiceMode,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) service: Arc<dyn Service>,
}

impl ServiceBuilder {
    pub fn new(name: impl Into<ServiceName>, service: impl Service) -> Self {
        Self::from_arc(name, Arc::new(service))
    }

    /// Same as [`new`](Self::new) for a service that is already shared.
    pub fn from_arc(name: impl Into<ServiceName>, service: Arc<dyn Service>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            mode: ServiceMode::default(),
            dependencies: Vec::new(),
            service,
        }
    }

    /// Adds an alternative name. Repeated aliases are ignored.
    pub fn with_alias(mut self, alias: impl Into<ServiceName>) -> Self {
        let alias = alias.into();
        if alias != self.name && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    pub fn with_mode(mut self, mode: ServiceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Shorthand for a plain required dependency.
    pub fn requires(self, name: impl Into<ServiceName>) -> Self {
        self.with_dependency(Dependency::on(name))
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn aliases(&self) -> &[ServiceName] {
        &self.aliases
    }

    pub fn mode(&self) -> ServiceMode {
        self.mode
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }
}
