//! Railgun Sound Server - authoritative synchronized sound dispatch
//!
//! This is the main entry point for the sound server. It handles:
//! - WebSocket connections carrying positions, fire events and sound directives
//! - The tick loop tracking which players are inside an impact's sound range
//! - Admin commands for the persisted sound range config

mod app;
mod config;
mod http;
mod sound;
mod util;
mod world;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::{Config, RangeConfigStore};
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Railgun Sound Server");
    info!("Server address: {}", config.server_addr);

    // Load the sound range config (falls back to defaults)
    let range_store = RangeConfigStore::load(&config.sound_config_path);
    let range = range_store.shared().snapshot();
    info!(
        radius = range.radius,
        debug_logging = range.debug_logging,
        "Sound range config ready"
    );

    // Create application state and the sound loop it feeds
    let (state, sound_loop) = AppState::new(config.clone(), range_store);

    // Spawn the authoritative sound loop
    tokio::spawn(sound_loop.run());

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws?player_id=<uuid>", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
