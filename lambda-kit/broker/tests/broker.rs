use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use lmb_broker::{
    ActionHandler, Broker, BrokerError, BrokerParams, BrokerState, Middleware, ServiceBroker,
    ServiceSchema,
};
use serde_json::{json, Value};

fn math() -> ServiceSchema {
    ServiceSchema::new("math").action("add", |ctx| async move {
        let a = ctx.params["a"].as_i64().unwrap_or_default();
        let b = ctx.params["b"].as_i64().unwrap_or_default();
        Ok(json!(a + b))
    })
}

struct Recorder {
    name: &'static str,
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Middleware for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn wrap_action(&self, _action: &str, next: ActionHandler) -> ActionHandler {
        let name = self.name;
        let seen = Arc::clone(&self.seen);
        Arc::new(move |ctx| {
            seen.lock().unwrap().push(name.to_string());
            next(ctx)
        })
    }
}

#[tokio::test]
async fn call_routes_to_registered_action() {
    let broker = ServiceBroker::new(BrokerParams::default());
    broker.create_service(math()).unwrap();
    broker.start().await.unwrap();

    let out = broker.call("math.add", json!({ "a": 1, "b": 2 })).await.unwrap();
    assert_eq!(out, json!(3));

    broker.stop().await.unwrap();
    assert_eq!(broker.state(), BrokerState::Stopped);
}

#[tokio::test]
async fn call_before_start_is_rejected() {
    let broker = ServiceBroker::new(BrokerParams::default());
    broker.create_service(math()).unwrap();

    let err = broker.call("math.add", Value::Null).await.unwrap_err();
    assert_eq!(err.code, Some(503));
}

#[tokio::test]
async fn unknown_action_is_service_not_found() {
    let broker = ServiceBroker::new(BrokerParams::default());
    broker.start().await.unwrap();

    let err = broker.call("math.sub", Value::Null).await.unwrap_err();
    assert_eq!(err.code, Some(404));
    assert_eq!(err.kind.as_deref(), Some("SERVICE_NOT_FOUND"));
}

#[tokio::test]
async fn first_middleware_runs_first() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let broker = ServiceBroker::new(BrokerParams {
        middlewares: vec![
            Arc::new(Recorder {
                name: "global",
                seen: Arc::clone(&seen),
            }),
            Arc::new(Recorder {
                name: "local",
                seen: Arc::clone(&seen),
            }),
        ],
        ..BrokerParams::default()
    });
    broker.create_service(math()).unwrap();
    broker.start().await.unwrap();
    broker.call("math.add", json!({ "a": 1, "b": 1 })).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["global", "local"]);
}

#[tokio::test]
async fn lifecycle_hooks_run_once() {
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));

    let broker = ServiceBroker::new(BrokerParams::default());
    broker
        .create_service(
            ServiceSchema::new("hooks")
                .on_started({
                    let started = Arc::clone(&started);
                    move || {
                        let started = Arc::clone(&started);
                        async move {
                            started.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    }
                })
                .on_stopped({
                    let stopped = Arc::clone(&stopped);
                    move || {
                        let stopped = Arc::clone(&stopped);
                        async move {
                            stopped.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    }
                }),
        )
        .unwrap();

    broker.start().await.unwrap();
    broker.start().await.unwrap();
    broker.stop().await.unwrap();
    broker.stop().await.unwrap();

    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn actions_can_call_other_actions() {
    let broker = ServiceBroker::new(BrokerParams::default());
    broker.create_service(math()).unwrap();
    broker
        .create_service(ServiceSchema::new("calc").action("double", |ctx| async move {
            let n = ctx.params["n"].clone();
            ctx.call("math.add", json!({ "a": n, "b": n })).await
        }))
        .unwrap();
    broker.start().await.unwrap();

    let out = broker.call("calc.double", json!({ "n": 21 })).await.unwrap();
    assert_eq!(out, json!(42));
}

#[tokio::test]
async fn node_service_lists_actions() {
    let broker = ServiceBroker::new(BrokerParams {
        internal_services: true,
        ..BrokerParams::default()
    });
    broker.create_service(math()).unwrap();
    broker.start().await.unwrap();

    let actions = broker.call("$node.actions", Value::Null).await.unwrap();
    let actions: Vec<String> = serde_json::from_value(actions).unwrap();
    assert!(actions.contains(&"math.add".to_string()));

    let services = broker.call("$node.services", Value::Null).await.unwrap();
    assert_eq!(services[1]["name"], "math");
}

#[tokio::test]
async fn action_errors_propagate_unchanged() {
    let broker = ServiceBroker::new(BrokerParams::default());
    broker
        .create_service(ServiceSchema::new("users").action("get", |_ctx| async {
            Err(BrokerError::new("missing").with_code(404).with_type("NotFound"))
        }))
        .unwrap();
    broker.start().await.unwrap();

    let err = broker.call("users.get", Value::Null).await.unwrap_err();
    assert_eq!(err.code, Some(404));
    assert_eq!(err.kind.as_deref(), Some("NotFound"));
}
