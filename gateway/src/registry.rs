//! Explicit registry of everything a config can reference by identifier.

use std::{collections::HashMap, fmt, sync::Arc};

use lmb_broker::{Middleware, ServiceSchema};

use crate::{error::GatewayError, handler::LambdaHandler, plugin::Plugin};

pub type ServiceFactory = Arc<dyn Fn() -> ServiceSchema + Send + Sync>;
pub type ServiceListFactory = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Registry {
    services: HashMap<String, ServiceFactory>,
    service_lists: HashMap<String, ServiceListFactory>,
    middlewares: HashMap<String, Arc<dyn Middleware>>,
    handlers: HashMap<String, Arc<dyn LambdaHandler>>,
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> ServiceSchema + Send + Sync + 'static,
    {
        self.services.insert(id.into(), Arc::new(factory));
        self
    }

    pub fn with_service_list<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        self.service_lists.insert(id.into(), Arc::new(factory));
        self
    }

    pub fn with_middleware(
        mut self,
        id: impl Into<String>,
        middleware: impl Middleware + 'static,
    ) -> Self {
        self.middlewares.insert(id.into(), Arc::new(middleware));
        self
    }

    pub fn with_handler(
        mut self,
        id: impl Into<String>,
        handler: impl LambdaHandler + 'static,
    ) -> Self {
        self.handlers.insert(id.into(), Arc::new(handler));
        self
    }

    pub fn with_plugin(mut self, id: impl Into<String>, plugin: impl Plugin + 'static) -> Self {
        self.plugins.insert(id.into(), Arc::new(plugin));
        self
    }

    /// Build a fresh schema for service `id`.
    pub fn service(&self, id: &str) -> Result<ServiceSchema, GatewayError> {
        self.services
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| GatewayError::UnknownService(id.to_string()))
    }

    pub fn service_list(&self, id: &str) -> Result<Vec<String>, GatewayError> {
        self.service_lists
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| GatewayError::UnknownServiceFactory(id.to_string()))
    }

    pub fn middleware(&self, id: &str) -> Result<Arc<dyn Middleware>, GatewayError> {
        self.middlewares
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownMiddleware(id.to_string()))
    }

    pub fn handler(&self, id: &str) -> Result<Arc<dyn LambdaHandler>, GatewayError> {
        self.handlers
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownHandler(id.to_string()))
    }

    pub fn plugin(&self, id: &str) -> Result<Arc<dyn Plugin>, GatewayError> {
        self.plugins
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownPlugin(id.to_string()))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys
        }

        f.debug_struct("Registry")
            .field("services", &keys(&self.services))
            .field("service_lists", &keys(&self.service_lists))
            .field("middlewares", &keys(&self.middlewares))
            .field("handlers", &keys(&self.handlers))
            .field("plugins", &keys(&self.plugins))
            .finish()
    }
}
