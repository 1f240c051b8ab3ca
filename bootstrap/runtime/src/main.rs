use std::path::PathBuf;

use clap::Parser;
use lmb_runtime::{demo, RuntimeConfig};

#[derive(Debug, Parser)]
struct Args {
    /// Overrides LMB_GATEWAY_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut cfg = RuntimeConfig::from_env()?;
    if let Some(path) = args.config {
        cfg.config_path = path;
    }

    lmb_runtime::init_tracing(cfg.json_logs);
    tracing::info!(
        config = %cfg.config_path.display(),
        function = %cfg.function_name,
        "starting"
    );

    lmb_runtime::run(cfg, demo::registry()).await
}
