//! Direct-request coordinator devnet node.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p drc-node --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p drc-node
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p drc-node
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `config.toml`)
//! - `HOST` - Override bind address (default: `0.0.0.0`)
//! - `PORT` - Override port (default: `4021`)
//! - `RUST_LOG` - Log level filter (default: `info`)

use std::net::SocketAddr;

use axum::http::Method;
use tokio::runtime::Handle;
use tower_http::cors;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use drc_node::config::NodeConfig;
use drc_node::shutdown::Shutdown;
use drc_node::{bootstrap, coordinator_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Node failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = NodeConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        specs = config.specs.len(),
        "Loaded configuration"
    );

    let shutdown = Shutdown::try_new()?;
    let state = bootstrap::build(&config, Handle::current(), shutdown.token())?;

    let app = coordinator_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Node listening on http://{addr}");

    let token = shutdown.token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    shutdown.recv().await;

    tracing::info!("Node shut down gracefully");
    Ok(())
}
