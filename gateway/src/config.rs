//! Gateway configuration loaded from YAML or JSON.
//!
//! Everything that was a function in a dynamic config (service factories, middlewares, handlers,
//! plugins) is referenced here by identifier and resolved through the
//! [`Registry`](crate::registry::Registry).

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{error::GatewayError, serde_ext::de_bool_or_string};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Top-level gateway configuration.
pub struct GatewayConfig {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    /// Middlewares applied to every lambda, in order.
    pub middlewares: Vec<String>,

    #[serde(default)]
    /// Services registered for every lambda.
    pub services: Option<ServiceSource>,

    /// Lambda definitions keyed by logical name.
    pub lambdas: BTreeMap<String, LambdaDefinition>,

    #[serde(default)]
    /// Interceptors run before the broker is built, in order.
    pub plugins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, deserialize_with = "de_bool_or_string")]
    /// Parse a textual `event.body` as JSON before dispatch.
    pub json: bool,

    #[serde(default, deserialize_with = "de_bool_or_string")]
    /// Keep the broker's call-tracking middleware (off by default).
    pub internal_middlewares: bool,

    #[serde(default, deserialize_with = "de_bool_or_string")]
    /// Keep the broker's `$node` introspection service (off by default).
    pub internal_services: bool,

    #[serde(default)]
    pub service: ServiceSettings,

    #[serde(default)]
    pub response: ResponseSettings,

    #[serde(flatten)]
    /// Remaining keys are handed to the broker engine untouched.
    pub broker: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettings {
    #[serde(default, deserialize_with = "de_bool_or_string")]
    /// Log each service registration.
    pub log: bool,

    #[serde(default, deserialize_with = "de_bool_or_string")]
    /// Log every registered action once services are created.
    pub list_all: bool,

    #[serde(default, deserialize_with = "de_bool_or_string")]
    /// Log the wall-clock duration of each dispatch.
    pub execution_time: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSettings {
    #[serde(default, deserialize_with = "de_bool_or_string")]
    /// Log outgoing envelopes.
    pub log: bool,

    #[serde(default, deserialize_with = "de_bool_or_string")]
    /// Accept `false`, `0` and `""` as results; only `null` counts as "nothing returned".
    pub allow_falsy: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
/// A static list of service identifiers, or a registered factory producing one.
pub enum ServiceSource {
    List(Vec<String>),
    Factory { factory: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One deployable function.
pub struct LambdaDefinition {
    /// Function name the hosting runtime reports for this lambda.
    pub name: String,

    #[serde(skip)]
    /// Logical key in [`GatewayConfig::lambdas`], stamped by the resolver.
    pub raw_name: Option<String>,

    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub handler: Option<String>,

    #[serde(default)]
    pub middlewares: Vec<String>,

    #[serde(default)]
    pub services: Option<ServiceSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What a lambda runs once the broker is started.
pub enum LambdaTarget<'a> {
    Action(&'a str),
    Handler(&'a str),
}

impl LambdaDefinition {
    /// Key used in errors and logs: the logical name once resolved, else the function name.
    pub fn display_name(&self) -> &str {
        self.raw_name.as_deref().unwrap_or(&self.name)
    }

    /// Exactly one of `action` / `handler` must be set.
    pub fn target(&self) -> Result<LambdaTarget<'_>, GatewayError> {
        match (self.action.as_deref(), self.handler.as_deref()) {
            (Some(action), None) => Ok(LambdaTarget::Action(action)),
            (None, Some(handler)) => Ok(LambdaTarget::Handler(handler)),
            (None, None) => Err(GatewayError::MissingTarget(self.display_name().to_string())),
            (Some(_), Some(_)) => {
                Err(GatewayError::AmbiguousTarget(self.display_name().to_string()))
            }
        }
    }
}

impl GatewayConfig {
    /// Parse a YAML gateway config from bytes.
    pub fn from_yaml_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_slice(bytes)?)
    }

    /// Parse a JSON gateway config from bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Load a config file; `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|err| anyhow::anyhow!("failed to read {}: {err}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_bytes(&bytes)
        } else {
            Self::from_yaml_bytes(&bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_optional_fields() {
        let yaml = br#"
lambdas:
  add:
    name: svc-dev-add
    action: math.add
"#;
        let cfg = GatewayConfig::from_yaml_bytes(yaml).unwrap();
        assert!(!cfg.settings.json);
        assert!(!cfg.settings.internal_middlewares);
        assert!(!cfg.settings.internal_services);
        assert!(!cfg.settings.service.log);
        assert!(!cfg.settings.response.allow_falsy);
        assert!(cfg.middlewares.is_empty());
        assert!(cfg.services.is_none());
        assert!(cfg.plugins.is_empty());

        let add = &cfg.lambdas["add"];
        assert_eq!(add.name, "svc-dev-add");
        assert!(add.raw_name.is_none());
        assert_eq!(add.target().unwrap(), LambdaTarget::Action("math.add"));
    }

    #[test]
    fn settings_keep_unknown_keys_for_the_broker() {
        let yaml = br#"
settings:
  json: "true"
  namespace: dev
  nodeID: lambda-1
  service:
    listAll: true
lambdas: {}
"#;
        let cfg = GatewayConfig::from_yaml_bytes(yaml).unwrap();
        assert!(cfg.settings.json);
        assert!(cfg.settings.service.list_all);
        assert_eq!(cfg.settings.broker["namespace"], "dev");
        assert_eq!(cfg.settings.broker["nodeID"], "lambda-1");
        assert!(!cfg.settings.broker.contains_key("json"));
    }

    #[test]
    fn services_accept_list_or_factory() {
        let json = br#"{
            "services": ["math", "users"],
            "lambdas": {
                "a": { "name": "fn-a", "handler": "h", "services": { "factory": "extra" } }
            }
        }"#;
        let cfg = GatewayConfig::from_json_bytes(json).unwrap();
        assert!(matches!(&cfg.services, Some(ServiceSource::List(ids)) if ids.len() == 2));
        assert!(matches!(
            &cfg.lambdas["a"].services,
            Some(ServiceSource::Factory { factory }) if factory == "extra"
        ));
    }

    #[test]
    fn target_requires_exactly_one_of_action_or_handler() {
        let yaml = br#"
lambdas:
  none:
    name: fn-none
  both:
    name: fn-both
    action: math.add
    handler: custom
"#;
        let cfg = GatewayConfig::from_yaml_bytes(yaml).unwrap();
        assert!(matches!(
            cfg.lambdas["none"].target(),
            Err(GatewayError::MissingTarget(name)) if name == "fn-none"
        ));
        assert!(matches!(
            cfg.lambdas["both"].target(),
            Err(GatewayError::AmbiguousTarget(_))
        ));
    }
}
