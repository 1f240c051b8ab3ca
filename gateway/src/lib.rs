//! `lmb-gateway` turns a service broker into a single-function serverless handler.
//!
//! For each invocation the gateway picks the lambda definition matching the running function,
//! builds a broker for it, runs either a broker action or a custom handler, and returns an
//! HTTP-gateway shaped response. Errors never escape an invocation; they come back as an
//! envelope with an error status.
//!
//! Core modules:
//! - [`config`]: gateway config (YAML/JSON)
//! - [`registry`]: identifiers -> services, middlewares, handlers, plugins
//! - [`resolver`]: lambda selection by function name
//! - [`factory`]: broker construction per lambda
//! - [`dispatcher`]: the per-invocation state machine
//! - [`response`]: envelope formatting

use std::{collections::HashMap, sync::Arc};

use lmb_broker::BrokerEngine;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod handler;
pub mod plugin;
pub mod registry;
pub mod resolver;
pub mod response;
pub(crate) mod serde_ext;

pub use config::{GatewayConfig, LambdaDefinition};
pub use dispatcher::{DispatchOutcome, RequestDispatcher};
pub use error::GatewayError;
pub use handler::{handler_fn, InvocationContext, InvocationParams, LambdaHandler};
pub use plugin::{Callback, Plugin};
pub use registry::Registry;
pub use response::{ResponseEnvelope, ResponseFormatter};

/// Build the handler for the function identified by `identity`.
///
/// The result maps the lambda's logical name to its dispatcher. Only the matching lambda gets a
/// handler, so the map holds exactly one entry.
pub fn handlers(
    config: GatewayConfig,
    registry: Registry,
    engine: Arc<dyn BrokerEngine>,
    identity: &str,
) -> Result<HashMap<String, RequestDispatcher>, GatewayError> {
    let lambda = resolver::resolve_lambda(&config.lambdas, identity)?;
    let raw_name = lambda.display_name().to_string();
    let dispatcher =
        RequestDispatcher::new(Arc::new(config), lambda, Arc::new(registry), engine)?;

    tracing::debug!(lambda = %raw_name, function = %identity, "handler ready");
    Ok(HashMap::from([(raw_name, dispatcher)]))
}
