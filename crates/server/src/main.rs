//! lander entry point.
//!
//! Boots the cache manager, runs install and activate, then serves either
//! the HTTP interception proxy or the MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use lander_client::{CacheManager, FetchClient, FetchConfig, ManagerConfig};
use lander_core::{AppConfig, CacheDb, Mode};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod proxy;
#[cfg(test)]
mod testing;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(version = %config.cache_version, mode = ?config.mode, "Starting lander");

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let network = FetchClient::new(FetchConfig::from_app_config(&config)?)?;
    let manager = Arc::new(CacheManager::new(db, Arc::new(network), ManagerConfig::from_app_config(&config)?));

    let report = manager.install().await;
    if !report.is_complete() {
        tracing::warn!(failed = report.failed.len(), "install finished with missing assets");
    }
    let deleted = manager.activate().await?;
    tracing::info!(deleted = deleted.len(), "cache manager activated");

    match config.mode {
        Mode::Proxy => {
            let state = proxy::ProxyState { manager, max_body_bytes: config.max_bytes };
            let listener = tokio::net::TcpListener::bind(&config.listen_addr)
                .await
                .with_context(|| format!("failed to bind {}", config.listen_addr))?;
            tracing::info!("Listening on http://{}", config.listen_addr);

            axum::serve(listener, proxy::router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Mode::Mcp => {
            tracing::info!("Serving MCP tools on stdio transport");
            let server = serve_server(handler::LanderServer::new(manager), stdio()).await?;
            server.waiting().await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
}
