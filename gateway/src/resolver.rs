//! Picks the lambda definition for the function the runtime is executing.

use std::collections::BTreeMap;

use crate::{config::LambdaDefinition, error::GatewayError};

/// Find the definition whose `name` equals `identity` and stamp its logical key as `raw_name`.
///
/// Definitions are scanned in key order and the first match wins; any further match is logged
/// and ignored.
pub fn resolve_lambda(
    lambdas: &BTreeMap<String, LambdaDefinition>,
    identity: &str,
) -> Result<LambdaDefinition, GatewayError> {
    let mut matches = lambdas.iter().filter(|(_, def)| def.name == identity);

    let (key, def) = matches
        .next()
        .ok_or_else(|| GatewayError::NoMatchingLambda(identity.to_string()))?;

    for (ignored, _) in matches {
        tracing::warn!(
            function = %identity,
            selected = %key,
            ignored = %ignored,
            "several lambdas share the invoked function name; using the first"
        );
    }

    let mut resolved = def.clone();
    resolved.raw_name = Some(key.clone());
    Ok(resolved)
}
