//! Per-invocation orchestration.
//!
//! One dispatch runs: JSON body parsing -> plugins -> broker build -> `start` -> action or
//! handler -> result check -> `stop` -> formatted response through the [`Callback`]. The broker
//! is stopped exactly once whether execution succeeded or not, and failures after the plugin
//! stage are always folded into an error envelope.

use std::{fmt, sync::Arc, time::Instant};

use lmb_broker::{Broker, BrokerEngine, BrokerError};
use serde_json::Value;

use crate::{
    config::{GatewayConfig, LambdaDefinition, LambdaTarget},
    error::GatewayError,
    factory::BrokerFactory,
    handler::{InvocationContext, InvocationParams, LambdaHandler},
    plugin::{run_plugins, Callback, Plugin},
    registry::Registry,
    response::{is_falsy, ResponseEnvelope, ResponseFormatter},
};

const NOTHING_RETURNED: &str = "nothing returned from the lambda; please return something";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How a dispatch ended.
pub enum DispatchOutcome {
    /// The dispatcher sent an envelope through the callback.
    Responded,
    /// A plugin asked to stop; the dispatcher wrote nothing.
    Interrupted,
}

/// Dispatcher bound to one resolved lambda.
pub struct RequestDispatcher {
    gateway: Arc<GatewayConfig>,
    lambda: LambdaDefinition,
    handler: Option<Arc<dyn LambdaHandler>>,
    factory: BrokerFactory,
    plugins: Vec<Arc<dyn Plugin>>,
    formatter: ResponseFormatter,
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("lambda", &self.lambda.display_name())
            .field("plugins", &self.gateway.plugins)
            .field("formatter", &self.formatter)
            .finish_non_exhaustive()
    }
}

impl RequestDispatcher {
    /// `lambda` is expected to come from [`resolve_lambda`](crate::resolver::resolve_lambda).
    /// Plugins and the lambda's handler are looked up here, so an unknown identifier fails
    /// construction.
    pub fn new(
        gateway: Arc<GatewayConfig>,
        lambda: LambdaDefinition,
        registry: Arc<Registry>,
        engine: Arc<dyn BrokerEngine>,
    ) -> Result<Self, GatewayError> {
        let plugins = gateway
            .plugins
            .iter()
            .map(|id| registry.plugin(id))
            .collect::<Result<Vec<_>, _>>()?;
        let handler = lambda
            .handler
            .as_deref()
            .map(|id| registry.handler(id))
            .transpose()?;

        Ok(Self {
            factory: BrokerFactory::new(engine, Arc::clone(&registry)),
            formatter: ResponseFormatter::new(&gateway.settings.response),
            gateway,
            lambda,
            handler,
            plugins,
        })
    }

    pub fn lambda(&self) -> &LambdaDefinition {
        &self.lambda
    }

    pub fn formatter(&self) -> &ResponseFormatter {
        &self.formatter
    }

    /// Dispatch one event, delivering the envelope through `callback`.
    pub async fn dispatch(
        &self,
        mut event: Value,
        context: InvocationContext,
        callback: &Callback,
    ) -> DispatchOutcome {
        if self.gateway.settings.json {
            if let Err(err) = parse_json_body(&mut event) {
                callback.send(self.formatter.format_error(&BrokerError::from(err)));
                return DispatchOutcome::Responded;
            }
        }

        if run_plugins(&self.plugins, &mut event, &context, callback) {
            tracing::debug!(
                lambda = %self.lambda.display_name(),
                "dispatch interrupted by plugin"
            );
            return DispatchOutcome::Interrupted;
        }

        let started = Instant::now();
        let params = InvocationParams { event, context };
        let envelope = match self.run(params).await {
            Ok(result) => self.formatter.format_success(&result),
            Err(err) => self.formatter.format_error(&err),
        };

        if self.gateway.settings.service.execution_time {
            tracing::info!(
                lambda = %self.lambda.display_name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "execution time"
            );
        }

        callback.send(envelope);
        DispatchOutcome::Responded
    }

    /// Dispatch and collect the envelope; `None` when a plugin interrupted without answering.
    pub async fn invoke(
        &self,
        event: Value,
        context: InvocationContext,
    ) -> Option<ResponseEnvelope> {
        let (callback, mut rx) = Callback::channel();
        self.dispatch(event, context, &callback).await;
        rx.try_recv().ok()
    }

    async fn run(&self, params: InvocationParams) -> Result<Value, BrokerError> {
        let target = self.lambda.target()?;
        let broker = self.factory.build(&self.gateway, &self.lambda)?;

        let result = self.execute(Arc::clone(&broker), target, params).await;
        if let Err(err) = broker.stop().await {
            tracing::warn!(error = %err, "broker stop failed");
        }
        result
    }

    async fn execute(
        &self,
        broker: Arc<dyn Broker>,
        target: LambdaTarget<'_>,
        params: InvocationParams,
    ) -> Result<Value, BrokerError> {
        broker.start().await?;

        let result = match target {
            LambdaTarget::Action(action) => broker.call(action, params.to_value()).await?,
            LambdaTarget::Handler(id) => {
                let handler = self
                    .handler
                    .clone()
                    .ok_or_else(|| GatewayError::UnknownHandler(id.to_string()))?;
                handler.handle(broker, params).await?
            }
        };

        if self.is_empty(&result) {
            return Err(BrokerError::new(NOTHING_RETURNED));
        }
        Ok(result)
    }

    fn is_empty(&self, result: &Value) -> bool {
        if self.gateway.settings.response.allow_falsy {
            result.is_null()
        } else {
            is_falsy(result)
        }
    }
}

/// Replace a textual `event.body` with its parsed JSON. Other bodies are left alone.
fn parse_json_body(event: &mut Value) -> Result<(), GatewayError> {
    let Some(body) = event.get_mut("body") else {
        return Ok(());
    };
    let Value::String(text) = body else {
        return Ok(());
    };
    let parsed: Value = serde_json::from_str(text).map_err(GatewayError::InvalidJsonBody)?;
    *body = parsed;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn textual_body_is_parsed() {
        let mut event = json!({ "body": "{\"x\":1}" });
        parse_json_body(&mut event).unwrap();
        assert_eq!(event, json!({ "body": { "x": 1 } }));
    }

    #[test]
    fn non_textual_body_is_untouched() {
        let mut event = json!({ "body": { "x": 1 } });
        parse_json_body(&mut event).unwrap();
        assert_eq!(event, json!({ "body": { "x": 1 } }));

        let mut event = json!({ "headers": {} });
        parse_json_body(&mut event).unwrap();
        assert_eq!(event, json!({ "headers": {} }));
    }

    #[test]
    fn malformed_body_is_an_error() {
        let mut event = json!({ "body": "{oops" });
        assert!(matches!(
            parse_json_body(&mut event),
            Err(GatewayError::InvalidJsonBody(_))
        ));
    }
}
