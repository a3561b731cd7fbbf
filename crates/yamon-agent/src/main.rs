use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use yamon_agent::{Agent, AgentConfig, Reporter};
use yamon_collector::Registry;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = AgentConfig::resolve(config_path.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("yamon={}", config.log_level).parse()?),
        )
        .init();

    tracing::info!(
        address = %config.address,
        signed = config.hash_key().is_some(),
        "yamon-agent starting"
    );

    let reporter = Reporter::from_config(&config).context("Failed to build HTTP client")?;
    let agent = Agent::new(
        Arc::new(Registry::with_runtime_collectors()),
        reporter,
        config.poll_interval(),
        config.report_interval(),
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            cancel.cancel();
        }
    });

    agent.run(cancel).await;
    Ok(())
}
