use serde_json::{json, Value};

/// Error crossing the broker contract.
///
/// Shaped like the errors a service broker hands back to callers: a `code` that maps onto an
/// HTTP status, a machine-readable `type`, and an optional `data` payload. `Display` renders
/// `"{name}: {message}"`, which is what callers fall back to when no `data` is attached.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{name}: {message}")]
pub struct BrokerError {
    pub name: String,
    pub message: String,
    pub code: Option<u16>,
    pub kind: Option<String>,
    pub data: Option<Value>,
}

impl BrokerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: "Error".to_string(),
            message: message.into(),
            code: None,
            kind: None,
            data: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// No registered action answers to `action`.
    pub fn service_not_found(action: &str) -> Self {
        Self::new(format!("Service '{action}' is not found."))
            .with_name("ServiceNotFoundError")
            .with_code(404)
            .with_type("SERVICE_NOT_FOUND")
            .with_data(json!({ "action": action }))
    }

    /// The broker is not (or no longer) accepting calls.
    pub fn not_started() -> Self {
        Self::new("broker is not started")
            .with_name("BrokerNotStartedError")
            .with_code(503)
            .with_type("BROKER_NOT_STARTED")
    }

    pub fn duplicate_service(full_name: &str) -> Self {
        Self::new(format!("service '{full_name}' is already registered"))
            .with_name("DuplicateServiceError")
            .with_code(500)
            .with_type("DUPLICATE_SERVICE")
            .with_data(json!({ "service": full_name }))
    }
}
