//! # blockmesh-node
//!
//! Daemon entry point: tracing, configuration, runtime, signal handling.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use node_runtime::{NodeConfig, NodeRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = NodeConfig::load()?;
    let runtime = NodeRuntime::start(config).await?;

    tokio::signal::ctrl_c().await?;
    info!("[node] interrupt received");
    runtime.shutdown();
    Ok(())
}
