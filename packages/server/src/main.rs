use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use executor::Executor;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load config")?;
    info!(environment = ?config.environment, "Server starting");

    let db = server::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    server::seed::ensure_indexes(&db)
        .await
        .context("Failed to create indexes")?;

    tokio::fs::create_dir_all(&config.sandbox.workspace_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create workspace root {}",
                config.sandbox.workspace_root.display()
            )
        })?;
    let executor = Arc::new(Executor::from_config(config.sandbox.clone()));
    info!(
        backend = ?config.sandbox.backend,
        workspace_root = %config.sandbox.workspace_root.display(),
        "Sandbox ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        db,
        config,
        executor,
    };
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
