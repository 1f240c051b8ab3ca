//! Broker contract and the in-process [`ServiceBroker`] engine.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::{
    middleware::{compose, CallTracker, Middleware},
    service::{ActionContext, ActionHandler, LifecycleHook, ServiceSchema},
    BrokerError,
};

/// Parameters a broker is constructed from.
#[derive(Clone, Default)]
pub struct BrokerParams {
    /// Enable the built-in call-tracking middleware.
    pub internal_middlewares: bool,
    /// Enable the `$node` introspection service.
    pub internal_services: bool,
    /// Applied to every action, first entry outermost.
    pub middlewares: Vec<Arc<dyn Middleware>>,
    /// Engine options the gateway does not interpret (`namespace`, `nodeID`, ...).
    pub options: Map<String, Value>,
}

impl fmt::Debug for BrokerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerParams")
            .field("internal_middlewares", &self.internal_middlewares)
            .field("internal_services", &self.internal_services)
            .field(
                "middlewares",
                &self.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
/// The operations the gateway needs from a broker engine.
pub trait Broker: Send + Sync {
    fn create_service(&self, schema: ServiceSchema) -> Result<(), BrokerError>;

    /// Fully-qualified names of every registered action.
    fn action_names(&self) -> Vec<String>;

    async fn start(&self) -> Result<(), BrokerError>;

    async fn call(&self, action: &str, params: Value) -> Result<Value, BrokerError>;

    async fn stop(&self) -> Result<(), BrokerError>;
}

/// Builds brokers. Abstracted so the gateway can be tested without a real engine.
pub trait BrokerEngine: Send + Sync {
    fn construct(&self, params: BrokerParams) -> Arc<dyn Broker>;
}

/// Engine producing in-process [`ServiceBroker`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEngine;

impl BrokerEngine for LocalEngine {
    fn construct(&self, params: BrokerParams) -> Arc<dyn Broker> {
        Arc::new(ServiceBroker::new(params))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Created,
    Started,
    Stopped,
}

struct RegisteredService {
    full_name: String,
    actions: Vec<String>,
    started: Option<LifecycleHook>,
    stopped: Option<LifecycleHook>,
}

struct Inner {
    options: Map<String, Value>,
    middlewares: Vec<Arc<dyn Middleware>>,
    services: RwLock<Vec<RegisteredService>>,
    actions: RwLock<BTreeMap<String, ActionHandler>>,
    state: Mutex<BrokerState>,
}

/// In-process broker: services live in this process and calls never leave it.
#[derive(Clone)]
pub struct ServiceBroker {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ServiceBroker {
    pub const NODE_SERVICE: &'static str = "$node";

    pub fn new(params: BrokerParams) -> Self {
        let mut middlewares = Vec::with_capacity(params.middlewares.len() + 1);
        if params.internal_middlewares {
            middlewares.push(Arc::new(CallTracker::default()) as Arc<dyn Middleware>);
        }
        middlewares.extend(params.middlewares);

        let broker = Self {
            inner: Arc::new(Inner {
                options: params.options,
                middlewares,
                services: RwLock::new(Vec::new()),
                actions: RwLock::new(BTreeMap::new()),
                state: Mutex::new(BrokerState::Created),
            }),
        };

        if params.internal_services {
            // Only fails on a duplicate name, and the registry is empty here.
            if let Err(err) = broker.create_service(node_service()) {
                tracing::warn!(error = %err, "failed to register internal services");
            }
        }

        broker
    }

    pub fn state(&self) -> BrokerState {
        *lock(&self.inner.state)
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.inner.options
    }

    pub fn middleware_names(&self) -> Vec<String> {
        self.inner
            .middlewares
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    /// Full names of the registered services, in registration order.
    pub fn service_names(&self) -> Vec<String> {
        self.inner
            .services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.full_name.clone())
            .collect()
    }

    fn lifecycle_hooks(&self, started: bool) -> Vec<LifecycleHook> {
        self.inner
            .services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|s| if started { s.started.clone() } else { s.stopped.clone() })
            .collect()
    }
}

impl fmt::Debug for ServiceBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBroker")
            .field("state", &self.state())
            .field("services", &self.service_names())
            .field("middlewares", &self.middleware_names())
            .finish()
    }
}

#[async_trait]
impl Broker for ServiceBroker {
    fn create_service(&self, schema: ServiceSchema) -> Result<(), BrokerError> {
        let full_name = schema.full_name();
        let mut services = self
            .inner
            .services
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if services.iter().any(|s| s.full_name == full_name) {
            return Err(BrokerError::duplicate_service(&full_name));
        }

        let mut actions = self
            .inner
            .actions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names = Vec::with_capacity(schema.actions.len());
        for (name, handler) in schema.actions {
            let action = format!("{full_name}.{name}");
            let handler = compose(&action, handler, &self.inner.middlewares);
            actions.insert(action.clone(), handler);
            names.push(action);
        }

        services.push(RegisteredService {
            full_name,
            actions: names,
            started: schema.started,
            stopped: schema.stopped,
        });
        Ok(())
    }

    fn action_names(&self) -> Vec<String> {
        self.inner
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    async fn start(&self) -> Result<(), BrokerError> {
        {
            let mut state = lock(&self.inner.state);
            match *state {
                BrokerState::Created => *state = BrokerState::Started,
                BrokerState::Started => return Ok(()),
                BrokerState::Stopped => return Err(BrokerError::not_started()),
            }
        }

        for mw in &self.inner.middlewares {
            mw.started().await?;
        }
        for hook in self.lifecycle_hooks(true) {
            hook().await?;
        }
        tracing::debug!(services = ?self.service_names(), "broker started");
        Ok(())
    }

    async fn call(&self, action: &str, params: Value) -> Result<Value, BrokerError> {
        if self.state() != BrokerState::Started {
            return Err(BrokerError::not_started());
        }

        let handler = self
            .inner
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(action)
            .cloned()
            .ok_or_else(|| BrokerError::service_not_found(action))?;

        handler(ActionContext {
            action: action.to_string(),
            params,
            broker: self.clone(),
        })
        .await
    }

    async fn stop(&self) -> Result<(), BrokerError> {
        let was_started = {
            let mut state = lock(&self.inner.state);
            let prev = std::mem::replace(&mut *state, BrokerState::Stopped);
            prev == BrokerState::Started
        };
        if !was_started {
            return Ok(());
        }

        let mut hooks = self.lifecycle_hooks(false);
        hooks.reverse();
        for hook in hooks {
            hook().await?;
        }
        for mw in self.inner.middlewares.iter().rev() {
            mw.stopped().await?;
        }
        tracing::debug!("broker stopped");
        Ok(())
    }
}

fn node_service() -> ServiceSchema {
    ServiceSchema::new(ServiceBroker::NODE_SERVICE)
        .action("services", |ctx| async move {
            let services = ctx.broker.inner.services.read().unwrap_or_else(PoisonError::into_inner);
            let out: Vec<Value> = services
                .iter()
                .map(|s| json!({ "name": s.full_name, "actions": s.actions }))
                .collect();
            Ok(Value::Array(out))
        })
        .action("actions", |ctx| async move {
            Ok(json!(ctx.broker.action_names()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_services_register_node_service() {
        let broker = ServiceBroker::new(BrokerParams {
            internal_services: true,
            ..BrokerParams::default()
        });
        assert_eq!(broker.service_names(), vec!["$node".to_string()]);
        assert!(broker.action_names().contains(&"$node.actions".to_string()));
    }

    #[test]
    fn internal_services_disabled_by_default() {
        let broker = ServiceBroker::new(BrokerParams::default());
        assert!(broker.service_names().is_empty());
        assert!(broker.middleware_names().is_empty());
    }

    #[test]
    fn internal_middlewares_prepend_tracker() {
        struct Named;
        impl Middleware for Named {
            fn name(&self) -> &str {
                "named"
            }
        }

        let broker = ServiceBroker::new(BrokerParams {
            internal_middlewares: true,
            middlewares: vec![Arc::new(Named)],
            ..BrokerParams::default()
        });
        assert_eq!(
            broker.middleware_names(),
            vec![CallTracker::NAME.to_string(), "named".to_string()]
        );
    }

    #[test]
    fn duplicate_service_is_rejected() {
        let broker = ServiceBroker::new(BrokerParams::default());
        broker.create_service(ServiceSchema::new("math")).unwrap();
        let err = broker.create_service(ServiceSchema::new("math")).unwrap_err();
        assert_eq!(err.kind.as_deref(), Some("DUPLICATE_SERVICE"));
    }
}
