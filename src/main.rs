//! Food ordering API gateway.
//!
//! ```text
//!     Client ──▶ origin ──▶ headers ──▶ compression ──▶ body limit
//!                                                          │
//!                 ┌────────────────────────────────────────┘
//!                 ▼
//!          request context ──▶ admission ──▶ [cache] ──▶ handler
//!                                                          │
//!     Client ◀── error boundary ◀──────────────────────────┘
//!
//!     Lifecycle: store (PostgreSQL) + cache (memory | Redis)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use food_gateway::config::{self, GatewayConfig};
use food_gateway::http::HttpServer;
use food_gateway::lifecycle::{signals, startup, Lifecycle};
use food_gateway::observability;

#[derive(Debug, Parser)]
#[command(name = "food-gateway", version, about = "HTTP API gateway for the food ordering platform")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listening port; overrides configuration and `PORT`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match config::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("food-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config.listener.set_port(port);
    }

    match run(config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: GatewayConfig) -> Result<u8, Box<dyn std::error::Error>> {
    observability::init_logging(&config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.mode,
        bind_address = %config.listener.bind_address,
        "food-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                observability::init_metrics(addr);
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let config = Arc::new(config);
    let lifecycle = Arc::new(Lifecycle::new(Duration::from_secs(
        config.shutdown.drain_timeout_secs,
    )));
    let cache = startup::start(&config, &lifecycle).await;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(Arc::clone(&config), Arc::clone(&lifecycle), cache);
    let serving = tokio::spawn(server.run(listener));

    let outcome = signals::shutdown_on_signal(Arc::clone(&lifecycle)).await;

    match serving.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server exited with error"),
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
    }

    Ok(outcome.exit_code() as u8)
}
