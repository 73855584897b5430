use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod body;
mod chat;
mod commands;
mod config;
mod middleware;
mod system;
mod vector_db;
mod workspace;

use app::{build_router, AppState};
use config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // -----------------------------
    // Logging
    // -----------------------------
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // -----------------------------
    // Config / Dependencies
    // -----------------------------
    let config = ServerConfig::from_env().context("invalid configuration")?;
    let addr = config.listen_addr();

    let vector_db = vector_db::connect(&config.vector_db);
    info!(backend = vector_db.backend(), "vector database configured");

    let state = AppState::new(config, vector_db);
    info!(commands = ?state.commands.names(), "interface commands registered");

    let app = build_router(state);

    // -----------------------------
    // Serve
    // -----------------------------
    let listener = bind(addr).await?;
    info!("listening on port {}", addr.port());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failure")?;

    info!("server stopped");
    Ok(())
}

async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|err| {
        error!(%addr, error = %err, "server error: could not bind listener");
        anyhow::Error::new(err).context(format!("failed to bind {addr}"))
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
