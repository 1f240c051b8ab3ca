//! Builds a broker for one lambda from the gateway config.

use std::sync::Arc;

use lmb_broker::{Broker, BrokerEngine, BrokerParams};

use crate::{
    config::{GatewayConfig, LambdaDefinition, ServiceSource},
    error::GatewayError,
    registry::Registry,
};

#[derive(Clone)]
pub struct BrokerFactory {
    engine: Arc<dyn BrokerEngine>,
    registry: Arc<Registry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Lambda,
}

impl Scope {
    fn as_str(self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Lambda => "lambda",
        }
    }
}

impl BrokerFactory {
    pub fn new(engine: Arc<dyn BrokerEngine>, registry: Arc<Registry>) -> Self {
        Self { engine, registry }
    }

    /// Derive broker parameters without touching `gateway`.
    ///
    /// Internal middlewares and services stay off unless the settings ask for them. Middlewares
    /// are the global list followed by the lambda's own, duplicates kept.
    pub fn params(
        &self,
        gateway: &GatewayConfig,
        lambda: &LambdaDefinition,
    ) -> Result<BrokerParams, GatewayError> {
        let middlewares = gateway
            .middlewares
            .iter()
            .chain(&lambda.middlewares)
            .map(|id| self.registry.middleware(id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BrokerParams {
            internal_middlewares: gateway.settings.internal_middlewares,
            internal_services: gateway.settings.internal_services,
            middlewares,
            options: gateway.settings.broker.clone(),
        })
    }

    /// Construct a broker with global then lambda-local services registered. The broker is not
    /// started.
    pub fn build(
        &self,
        gateway: &GatewayConfig,
        lambda: &LambdaDefinition,
    ) -> Result<Arc<dyn Broker>, GatewayError> {
        let broker = self.engine.construct(self.params(gateway, lambda)?);

        let log = gateway.settings.service.log;
        self.register(broker.as_ref(), gateway.services.as_ref(), Scope::Global, log)?;
        self.register(broker.as_ref(), lambda.services.as_ref(), Scope::Lambda, log)?;

        if gateway.settings.service.list_all {
            for action in broker.action_names() {
                tracing::info!(action = %action, "action registered");
            }
        }

        Ok(broker)
    }

    fn service_ids(&self, source: &ServiceSource) -> Result<Vec<String>, GatewayError> {
        match source {
            ServiceSource::List(ids) => Ok(ids.clone()),
            ServiceSource::Factory { factory } => self.registry.service_list(factory),
        }
    }

    fn register(
        &self,
        broker: &dyn Broker,
        source: Option<&ServiceSource>,
        scope: Scope,
        log: bool,
    ) -> Result<(), GatewayError> {
        let Some(source) = source else {
            return Ok(());
        };

        for id in self.service_ids(source)? {
            broker.create_service(self.registry.service(&id)?)?;
            if log {
                tracing::info!(scope = scope.as_str(), service = %id, "service created");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use lmb_broker::{LocalEngine, Middleware, ServiceSchema};

    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Middleware for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn registry() -> Registry {
        Registry::new()
            .with_middleware("auth", Named("auth"))
            .with_middleware("audit", Named("audit"))
            .with_service("math", || {
                ServiceSchema::new("math").action("add", |_| async { Ok(1.into()) })
            })
            .with_service("users", || {
                ServiceSchema::new("users").action("get", |_| async { Ok(2.into()) })
            })
            .with_service_list("extra", || vec!["users".to_string()])
    }

    fn factory() -> BrokerFactory {
        BrokerFactory::new(Arc::new(LocalEngine), Arc::new(registry()))
    }

    fn gateway(yaml: &[u8]) -> GatewayConfig {
        GatewayConfig::from_yaml_bytes(yaml).unwrap()
    }

    #[test]
    fn params_disable_internals_by_default() {
        let gw = gateway(
            br#"
settings:
  namespace: dev
lambdas:
  a: { name: fn-a, action: math.add }
"#,
        );
        let params = factory().params(&gw, &gw.lambdas["a"]).unwrap();
        assert!(!params.internal_middlewares);
        assert!(!params.internal_services);
        assert!(params.middlewares.is_empty());
        assert_eq!(params.options["namespace"], "dev");
    }

    #[test]
    fn params_keep_internals_when_requested() {
        let gw = gateway(
            br#"
settings:
  internalMiddlewares: true
  internalServices: "true"
lambdas:
  a: { name: fn-a, action: math.add }
"#,
        );
        let params = factory().params(&gw, &gw.lambdas["a"]).unwrap();
        assert!(params.internal_middlewares);
        assert!(params.internal_services);
    }

    #[test]
    fn middlewares_are_global_then_local_without_dedup() {
        let gw = gateway(
            br#"
middlewares: [auth, audit]
lambdas:
  a: { name: fn-a, action: math.add, middlewares: [audit, auth] }
"#,
        );
        let params = factory().params(&gw, &gw.lambdas["a"]).unwrap();
        let names: Vec<&str> = params.middlewares.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["auth", "audit", "audit", "auth"]);
        // The config itself is left as written.
        assert_eq!(gw.middlewares, vec!["auth", "audit"]);
    }

    #[test]
    fn unknown_middleware_is_an_error() {
        let gw = gateway(
            br#"
lambdas:
  a: { name: fn-a, action: math.add, middlewares: [nope] }
"#,
        );
        assert!(matches!(
            factory().params(&gw, &gw.lambdas["a"]),
            Err(GatewayError::UnknownMiddleware(id)) if id == "nope"
        ));
    }

    #[test]
    fn build_registers_global_and_lambda_services() {
        let gw = gateway(
            br#"
services: [math]
lambdas:
  a: { name: fn-a, action: math.add, services: { factory: extra } }
"#,
        );
        let broker = factory().build(&gw, &gw.lambdas["a"]).unwrap();
        assert_eq!(
            broker.action_names(),
            vec!["math.add".to_string(), "users.get".to_string()]
        );
    }

    #[test]
    fn build_fails_on_unknown_service() {
        let gw = gateway(
            br#"
services: [math, billing]
lambdas:
  a: { name: fn-a, action: math.add }
"#,
        );
        assert!(matches!(
            factory().build(&gw, &gw.lambdas["a"]),
            Err(GatewayError::UnknownService(id)) if id == "billing"
        ));
    }

    #[test]
    fn build_surfaces_duplicate_services() {
        let gw = gateway(
            br#"
services: [math]
lambdas:
  a: { name: fn-a, action: math.add, services: [math] }
"#,
        );
        let err = factory().build(&gw, &gw.lambdas["a"]).err().unwrap();
        assert!(matches!(
            err,
            GatewayError::Broker(e) if e.kind.as_deref() == Some("DUPLICATE_SERVICE")
        ));
    }
}
