//! Response envelope and formatting.
//!
//! Every invocation ends with an HTTP-gateway shaped envelope: `headers` (permissive CORS
//! defaults, overridable key by key), `statusCode`, and a JSON-serialized `body`.

use lmb_broker::BrokerError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::ResponseSettings;

const DEFAULT_STATUS: u16 = 200;
const ERROR_STATUS: u16 = 500;
const DEFAULT_ERROR_TYPE: &str = "Critical";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Envelope returned to the hosting runtime.
pub struct ResponseEnvelope {
    pub headers: Map<String, Value>,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

fn default_headers() -> Map<String, Value> {
    let mut headers = Map::new();
    headers.insert("Access-Control-Allow-Origin".to_string(), json!("*"));
    headers.insert("Access-Control-Allow-Credentials".to_string(), json!(true));
    headers
}

/// JavaScript-style falsiness, used where configs and results expect it.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn status_from(value: Option<&Value>) -> Option<u16> {
    match value? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter {
    log: bool,
}

impl ResponseFormatter {
    pub fn new(settings: &ResponseSettings) -> Self {
        Self { log: settings.log }
    }

    /// Build an envelope: CORS defaults, then `headers` on top (caller wins).
    pub fn format_response(
        &self,
        code: u16,
        headers: Option<&Map<String, Value>>,
        body: &Value,
    ) -> ResponseEnvelope {
        let mut merged = default_headers();
        if let Some(headers) = headers {
            for (k, v) in headers {
                merged.insert(k.clone(), v.clone());
            }
        }

        let body = serde_json::to_string(body).unwrap_or_else(|_| "null".to_string());
        if self.log {
            let logged_headers = Value::Object(merged.clone());
            tracing::info!(
                status_code = code,
                headers = %logged_headers,
                body = %body,
                "response"
            );
        }

        ResponseEnvelope {
            headers: merged,
            status_code: code,
            body,
        }
    }

    /// A result without a `body` key is the body itself (status 200). A result with one is an
    /// envelope: `body`, `code` and optional `headers` are taken from it.
    pub fn format_success(&self, result: &Value) -> ResponseEnvelope {
        match result.as_object() {
            Some(obj) if obj.contains_key("body") => self.format_response(
                status_from(obj.get("code")).unwrap_or(DEFAULT_STATUS),
                obj.get("headers").and_then(Value::as_object),
                &obj["body"],
            ),
            _ => self.format_response(DEFAULT_STATUS, None, result),
        }
    }

    /// Log `error` and report it as `{type, data}` with its code (500 when unset).
    pub fn format_error(&self, error: &BrokerError) -> ResponseEnvelope {
        tracing::error!(error = %error, code = ?error.code, kind = ?error.kind, "invocation failed");

        let code = error.code.filter(|c| *c != 0).unwrap_or(ERROR_STATUS);
        let kind = error
            .kind
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_ERROR_TYPE);
        let data = match &error.data {
            Some(data) if !is_falsy(data) => data.clone(),
            _ => Value::String(error.to_string()),
        };

        self.format_response(code, None, &json!({ "type": kind, "data": data }))
    }
}
