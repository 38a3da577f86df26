use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hackforge_server::config::env;
use hackforge_server::provider::UnconfiguredProcessor;
use hackforge_server::session::MemorySessionStore;
use hackforge_server::{router, AppState, ServerConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Hackforge authentication bridge
#[derive(Debug, Parser)]
#[command(name = "hackforge-server", version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "HACKFORGE_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_env(env::LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        },
    };
    tracing::debug!(?config, "configuration loaded");

    if config.dev_bypass_enabled {
        tracing::warn!("development bypass is ENABLED; do not run this configuration in production");
    }

    let sessions = Arc::new(MemorySessionStore::new(config.session_cookie.clone()));
    let addr = config.listen_addr;
    let state = AppState::new(config, sessions, Arc::new(UnconfiguredProcessor))
        .context("failed to initialize application state")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
