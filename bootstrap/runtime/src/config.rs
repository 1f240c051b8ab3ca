use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "gateway.yaml";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Gateway config file, YAML unless it ends in `.json`.
    pub config_path: PathBuf,
    /// Identity matched against each lambda's `name`.
    pub function_name: String,
    pub json_logs: bool,
}

impl RuntimeConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config_path = std::env::var("LMB_GATEWAY_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into())
            .into();

        let function_name = std::env::var("LMB_FUNCTION_NAME")
            .ok()
            .or_else(|| std::env::var("AWS_LAMBDA_FUNCTION_NAME").ok())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("missing LMB_FUNCTION_NAME and AWS_LAMBDA_FUNCTION_NAME")
            })?;

        let json_logs = std::env::var("AWS_LAMBDA_LOG_FORMAT")
            .unwrap_or_default()
            .eq_ignore_ascii_case("json");

        Ok(Self {
            config_path,
            function_name,
            json_logs,
        })
    }
}
