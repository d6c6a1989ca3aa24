//! CipherKeep Server
//!
//! Stores end-to-end encrypted items for registered accounts and serves
//! incremental sync. Item contents arrive already sealed by the client;
//! the server never holds the keys that open them.

mod auth;
mod config;
mod error;
mod handlers;
mod server;
mod token;

#[cfg(test)]
mod tests;

use cipherkeep_core::SqliteStore;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cipherkeep-server", about = "CipherKeep encrypted secrets server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cipherkeep.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Database path override (`:memory:` for a throwaway store)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Token signing secret override
    #[arg(long, env = "CIPHERKEEP_TOKEN_SECRET", hide_env_values = true)]
    token_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        config::ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        config::ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.storage_path = database;
    }
    if let Some(secret) = cli.token_secret {
        cfg.token_secret = secret;
    }
    cfg.validate()?;

    let store = if cfg.is_in_memory() {
        tracing::warn!("Using an in-memory database; data is lost on exit");
        SqliteStore::in_memory()?
    } else {
        SqliteStore::open(&cfg.storage_path)?
    };

    tracing::info!("Starting CipherKeep server on {}", cfg.listen_addr);

    let state = server::AppState::new(Arc::new(store), &cfg);
    let app = server::build_router(state, &cfg);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
