use std::sync::Arc;

use lambda_runtime::{service_fn, Context, Error, LambdaEvent};
use lmb_broker::{BrokerError, LocalEngine};
use lmb_gateway::{
    handlers, GatewayConfig, InvocationContext, Registry, RequestDispatcher, ResponseEnvelope,
    ResponseFormatter,
};
use serde_json::Value;

use crate::config::RuntimeConfig;

/// What the function serves for its whole lifetime.
#[derive(Debug)]
pub enum Gateway {
    Ready(RequestDispatcher),
    /// Setup failed; every invocation gets this envelope.
    Misconfigured(ResponseEnvelope),
}

impl Gateway {
    /// Load the gateway config and build the dispatcher for `cfg.function_name`.
    pub fn load(cfg: &RuntimeConfig, registry: Registry) -> Self {
        match setup(cfg, registry) {
            Ok(dispatcher) => {
                tracing::info!(
                    lambda = %dispatcher.lambda().display_name(),
                    function = %cfg.function_name,
                    "gateway ready"
                );
                Self::Ready(dispatcher)
            }
            Err(err) => {
                tracing::error!(
                    config = %cfg.config_path.display(),
                    function = %cfg.function_name,
                    error = %err,
                    "gateway setup failed"
                );
                Self::Misconfigured(ResponseFormatter::default().format_error(&err))
            }
        }
    }

    /// Serve one event. `Value::Null` means a plugin interrupted without answering.
    pub async fn handle(
        &self,
        event: Value,
        context: InvocationContext,
    ) -> Result<Value, serde_json::Error> {
        let envelope = match self {
            Self::Ready(dispatcher) => dispatcher.invoke(event, context).await,
            Self::Misconfigured(envelope) => Some(envelope.clone()),
        };
        match envelope {
            Some(envelope) => serde_json::to_value(envelope),
            None => Ok(Value::Null),
        }
    }
}

fn setup(cfg: &RuntimeConfig, registry: Registry) -> Result<RequestDispatcher, BrokerError> {
    let config = GatewayConfig::from_path(&cfg.config_path)
        .map_err(|err| BrokerError::new(format!("{err:#}")).with_name("ConfigError"))?;

    let handlers = handlers(config, registry, Arc::new(LocalEngine), &cfg.function_name)?;
    handlers
        .into_values()
        .next()
        .ok_or_else(|| BrokerError::new("no handler was built").with_name("ConfigError"))
}

pub fn invocation_context(ctx: &Context) -> InvocationContext {
    let mut context = InvocationContext {
        aws_request_id: ctx.request_id.clone(),
        function_name: ctx.env_config.function_name.clone(),
        invoked_function_arn: ctx.invoked_function_arn.clone(),
        deadline_ms: ctx.deadline,
        ..InvocationContext::default()
    };
    if let Some(trace_id) = &ctx.xray_trace_id {
        context
            .extra
            .insert("xrayTraceId".to_string(), Value::String(trace_id.clone()));
    }
    context
}

pub async fn run(cfg: RuntimeConfig, registry: Registry) -> anyhow::Result<()> {
    let gateway = Arc::new(Gateway::load(&cfg, registry));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let gateway = Arc::clone(&gateway);
        async move {
            let LambdaEvent { payload, context } = event;
            let response = gateway
                .handle(payload, invocation_context(&context))
                .await?;
            Ok::<_, Error>(response)
        }
    }))
    .await
    .map_err(|err| anyhow::anyhow!("lambda runtime stopped: {err}"))
}

pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
