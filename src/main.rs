//! Request gate server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ ┌──────────────── gate ────────────────┐
//!                                            │ OPTIONS? ──yes──▶ 204 (+security)    │
//!                                            │ rate limit ─over─▶ 429 (+security)   │
//!                                            │      │                               │
//!                                            │      ▼                               │
//!                                            │   handler (auth on demand)           │
//!                                            │      │                               │
//!                                            │      ▼                               │
//!     Client Response                        │ CORS ─▶ security ─▶ X-RateLimit-*    │
//!     ◀──────────────────────────────────────┴──────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use request_gate::config::load_config;
use request_gate::lifecycle::{wait_for_signal, Shutdown};
use request_gate::observability::{logging, metrics};
use request_gate::security::JwtVerifier;
use request_gate::HttpServer;

#[derive(Parser)]
#[command(name = "request-gate")]
#[command(about = "CORS, rate limiting and auth gate for the task API", long_about = None)]
struct Cli {
    /// Optional TOML config file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let config = load_config(cli.config.as_deref())?;
    if cli.check {
        println!("Configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!("request-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.security.environment,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let verifier = Arc::new(JwtVerifier::new(&config.auth.jwt_secret));
    let server = HttpServer::new(config, verifier);
    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
