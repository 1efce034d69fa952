//! Blink Motors REST server.
//!
//! Usage:
//!   ACCESS_TOKEN_SECRET=... cargo run --bin blink_motors
//!   cargo run --bin seed_data      # optional sample data
//!
//! See `config.rs` for the recognised environment variables.

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use blink_motors::auth::TokenService;
use blink_motors::config::Config;
use blink_motors::logging;
use blink_motors::rest::{create_router, AppState};
use blink_motors::storage::Storage;

#[derive(Parser)]
#[command(name = "blink_motors", about = "Blink Motors REST server")]
struct Args {
    /// Listen port, overrides PORT
    #[arg(short, long)]
    port: Option<u16>,
    /// Document store location, overrides BLINK_DB_PATH
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.db_path {
        config.db_path = path;
    }

    let _log_guard = logging::init(&config.log);

    let storage = Storage::open(&config.db_path)?;
    tracing::info!(path = %config.db_path.display(), "document store opened");
    let tokens = TokenService::new(config.token_secret_bytes())?;

    let app = create_router(AppState::new(storage.clone(), tokens, config.port));

    let listener = TcpListener::bind(config.socket_addr()).await?;
    tracing::info!("Blink Motors app listening on {}", config.socket_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.close().await?;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
