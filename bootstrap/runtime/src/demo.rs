//! Services, handlers and plugins the sample `gateway.yaml` refers to.

use std::sync::Arc;

use lmb_broker::{Broker, BrokerError, ServiceSchema};
use lmb_gateway::{handler_fn, Callback, InvocationContext, Registry, ResponseEnvelope};
use serde_json::{json, Value};

fn operands(params: &Value) -> Result<(f64, f64), BrokerError> {
    let body = &params["event"]["body"];
    match (body["a"].as_f64(), body["b"].as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(BrokerError::new("expected numeric 'a' and 'b' in the body")
            .with_name("ValidationError")
            .with_code(422)
            .with_type("VALIDATION_ERROR")
            .with_data(body.clone())),
    }
}

/// Whole results are written without a fraction (`3`, not `3.0`).
fn number(x: f64) -> Value {
    if x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
        json!(x as i64)
    } else {
        json!(x)
    }
}

pub fn math() -> ServiceSchema {
    ServiceSchema::new("math")
        .action("add", |ctx| async move {
            let (a, b) = operands(&ctx.params)?;
            Ok::<_, BrokerError>(number(a + b))
        })
        .action("div", |ctx| async move {
            let (a, b) = operands(&ctx.params)?;
            if b == 0.0 {
                return Err(BrokerError::new("division by zero")
                    .with_code(400)
                    .with_type("DIVISION_BY_ZERO"));
            }
            Ok::<_, BrokerError>(number(a / b))
        })
}

pub fn greeter() -> ServiceSchema {
    ServiceSchema::new("greeter").action("hello", |ctx| async move {
        let name = ctx.params["event"]["queryStringParameters"]["name"]
            .as_str()
            .unwrap_or("world")
            .to_string();
        Ok(json!({ "body": { "message": format!("hello {name}") } }))
    })
}

/// Skips the broker entirely for scheduled keep-warm pings.
pub fn warmup(event: &mut Value, _context: &InvocationContext, callback: &Callback) -> bool {
    if event["source"] != "serverless-plugin-warmup" {
        return false;
    }
    callback.send(ResponseEnvelope {
        headers: Default::default(),
        status_code: 200,
        body: "\"warm\"".to_string(),
    });
    true
}

pub fn registry() -> Registry {
    Registry::new()
        .with_service("math", math)
        .with_service("greeter", greeter)
        .with_service_list("public", || vec!["greeter".to_string()])
        .with_handler(
            "sum-report",
            handler_fn(|broker: Arc<dyn Broker>, params| async move {
                let sum = broker.call("math.add", params.to_value()).await?;
                Ok::<_, BrokerError>(json!({
                    "body": { "sum": sum, "requestId": params.context.aws_request_id },
                    "code": 200,
                    "headers": { "Cache-Control": "no-store" },
                }))
            }),
        )
        .with_plugin("warmup", warmup)
}
