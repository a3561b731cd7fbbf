use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use yamon_server::app;
use yamon_server::config::ServerConfig;
use yamon_server::state::AppState;
use yamon_storage::{InMemoryStore, Repository, SqliteRepository};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = ServerConfig::resolve(config_path.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("yamon={}", config.log_level).parse()?),
        )
        .init();

    tracing::info!(
        address = %config.address,
        store_interval_secs = config.store_interval_secs,
        store_file = %config.store_file,
        restore = config.restore,
        database = config.database_path.as_deref().unwrap_or("-"),
        "yamon-server starting"
    );

    let mut flusher = None;
    let repo: Arc<dyn Repository> = match config.database_path.as_deref() {
        Some(path) => Arc::new(
            SqliteRepository::open(Path::new(path), config.restore)
                .with_context(|| format!("Failed to open database {path}"))?,
        ),
        None => {
            let (store, task) = InMemoryStore::open(&config.store_config())
                .context("Failed to restore metrics snapshot")?;
            flusher = Some(task);
            store
        }
    };

    let state = AppState::new(repo, config.hash_key());
    let app = app::build_http_app(state);
    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.address))?;
    tracing::info!(http = %config.address, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down gracefully");
        })
        .await
        .context("HTTP server error")?;

    if let Some(flusher) = flusher {
        flusher.shutdown().await.context("Final snapshot flush failed")?;
    }
    tracing::info!("Server stopped");
    Ok(())
}
