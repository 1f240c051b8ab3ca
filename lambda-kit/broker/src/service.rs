//! Service schemas: named groups of actions plus lifecycle hooks.

use std::{collections::BTreeMap, fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::{broker::ServiceBroker, Broker, BrokerError};

pub type ActionFuture = BoxFuture<'static, Result<Value, BrokerError>>;

/// A callable action. Middlewares wrap these, so the type is shared and cheap to clone.
pub type ActionHandler = Arc<dyn Fn(ActionContext) -> ActionFuture + Send + Sync>;

pub type LifecycleHook = Arc<dyn Fn() -> BoxFuture<'static, Result<(), BrokerError>> + Send + Sync>;

/// Per-call context handed to an action.
#[derive(Clone)]
pub struct ActionContext {
    /// Fully-qualified action name (`service.action`).
    pub action: String,
    pub params: Value,
    /// The broker the action runs on; use it for nested calls.
    pub broker: ServiceBroker,
}

impl ActionContext {
    pub async fn call(&self, action: &str, params: Value) -> Result<Value, BrokerError> {
        self.broker.call(action, params).await
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("action", &self.action)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Wrap an async closure as an [`ActionHandler`].
pub fn action_fn<F, Fut>(f: F) -> ActionHandler
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BrokerError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Declarative service definition registered through [`Broker::create_service`].
#[derive(Clone, Default)]
pub struct ServiceSchema {
    pub name: String,
    pub version: Option<String>,
    pub actions: BTreeMap<String, ActionHandler>,
    pub started: Option<LifecycleHook>,
    pub stopped: Option<LifecycleHook>,
}

impl ServiceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn action<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BrokerError>> + Send + 'static,
    {
        self.actions.insert(name.into(), action_fn(f));
        self
    }

    pub fn on_started<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BrokerError>> + Send + 'static,
    {
        self.started = Some(Arc::new(move || Box::pin(f())));
        self
    }

    pub fn on_stopped<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BrokerError>> + Send + 'static,
    {
        self.stopped = Some(Arc::new(move || Box::pin(f())));
        self
    }

    /// `v{version}.{name}` for versioned services, otherwise `name`.
    pub fn full_name(&self) -> String {
        match &self.version {
            Some(version) => format!("v{version}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Debug for ServiceSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSchema")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("started", &self.started.is_some())
            .field("stopped", &self.stopped.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_prefixes_version() {
        assert_eq!(ServiceSchema::new("math").full_name(), "math");
        assert_eq!(ServiceSchema::new("math").version("2").full_name(), "v2.math");
    }

    #[test]
    fn action_builder_registers_by_name() {
        let schema = ServiceSchema::new("math")
            .action("add", |_ctx| async { Ok(Value::Null) })
            .action("sub", |_ctx| async { Ok(Value::Null) });
        assert_eq!(
            schema.actions.keys().cloned().collect::<Vec<_>>(),
            vec!["add".to_string(), "sub".to_string()]
        );
    }
}
