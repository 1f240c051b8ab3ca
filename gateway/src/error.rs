use lmb_broker::BrokerError;

/// Configuration errors raised while resolving, building or dispatching a lambda.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no lambda definition matches invoked function '{0}'")]
    NoMatchingLambda(String),

    #[error("lambda '{0}' has neither a handler nor an action to handle the event")]
    MissingTarget(String),

    #[error("lambda '{0}' declares both an action and a handler")]
    AmbiguousTarget(String),

    #[error("service '{0}' is not registered")]
    UnknownService(String),

    #[error("service list factory '{0}' is not registered")]
    UnknownServiceFactory(String),

    #[error("middleware '{0}' is not registered")]
    UnknownMiddleware(String),

    #[error("handler '{0}' is not registered")]
    UnknownHandler(String),

    #[error("plugin '{0}' is not registered")]
    UnknownPlugin(String),

    #[error("event body is not valid JSON: {0}")]
    InvalidJsonBody(#[source] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl From<GatewayError> for BrokerError {
    /// Configuration errors carry no code or type, so they are reported as a 500 "Critical".
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Broker(inner) => inner,
            GatewayError::InvalidJsonBody(_) => BrokerError::new(err.to_string())
                .with_name("InvalidJsonBodyError")
                .with_code(400)
                .with_type("INVALID_JSON_BODY"),
            other => BrokerError::new(other.to_string()),
        }
    }
}
