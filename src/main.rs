//! Flag Race Server
//!
//! Authoritative capture-the-flag racing server. One 60 Hz game loop owns the
//! world; each WebSocket connection feeds it inputs and drains its own
//! outbound queue. `/health` reports the match clock and player count.

mod app;
mod config;
mod game;
mod http;
mod util;
mod ws;

use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::{init_server_time, TICK_RATE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    setup_logging(&config.log_level);
    init_server_time();

    let addr = config.server_addr;
    info!(%addr, tick_rate = TICK_RATE, "Starting Flag Race Server");

    let (state, runner) = AppState::new(config);
    let (stop_tx, stop_rx) = watch::channel(false);
    let game_loop = tokio::spawn(runner.run(stop_rx));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening: ws://{addr}/ws, health at http://{addr}/health");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            let signal = wait_for_signal().await;
            info!(signal, "Shutting down");
            let _ = stop_tx.send(true);
        })
        .await?;

    if let Err(e) = game_loop.await {
        warn!(error = %e, "Game loop ended abnormally");
    }

    info!("Server stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level when set
fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "ctrl-c",
        _ = terminate => "terminate",
    }
}
