//! Custom lambda handlers and the parameters every invocation carries.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use lmb_broker::{Broker, BrokerError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Invocation metadata supplied by the hosting runtime.
pub struct InvocationContext {
    pub aws_request_id: String,
    pub function_name: String,
    pub invoked_function_arn: String,
    /// Invocation deadline, epoch milliseconds.
    pub deadline_ms: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
/// `{event, context}` pair handed to actions and handlers.
pub struct InvocationParams {
    pub event: Value,
    pub context: InvocationContext,
}

impl InvocationParams {
    /// JSON form used as the parameters of an action call.
    pub fn to_value(&self) -> Value {
        json!({
            "event": self.event,
            "context": serde_json::to_value(&self.context).unwrap_or_default(),
        })
    }
}

#[async_trait]
/// A custom function run instead of a broker action.
///
/// The handler receives the started broker explicitly, so it can call actions on it.
pub trait LambdaHandler: Send + Sync {
    async fn handle(
        &self,
        broker: Arc<dyn Broker>,
        params: InvocationParams,
    ) -> Result<Value, BrokerError>;
}

/// Adapter returned by [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F>(F);

/// Wrap an async closure as a [`LambdaHandler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Arc<dyn Broker>, InvocationParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BrokerError>> + Send,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> LambdaHandler for HandlerFn<F>
where
    F: Fn(Arc<dyn Broker>, InvocationParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BrokerError>> + Send,
{
    async fn handle(
        &self,
        broker: Arc<dyn Broker>,
        params: InvocationParams,
    ) -> Result<Value, BrokerError> {
        (self.0)(broker, params).await
    }
}
