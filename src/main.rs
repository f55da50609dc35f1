//! keepalive-proxy
//!
//! Forwards every downstream HTTP/1.1 request to one fixed upstream over a
//! pool of keep-alive connections.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                     PROXY                            │
//!   Client        │  ┌──────────┐   ┌──────────┐   ┌──────────────────┐  │
//!   ─────────────▶│  │ listener │──▶│ session  │──▶│ link pool        │  │
//!                 │  │ (accept) │   │ (loop)   │   │ acquire/release  │  │
//!                 │  └──────────┘   └────┬─────┘   └────────┬─────────┘  │
//!                 │                      │                  ▼            │
//!                 │                      │         ┌──────────────────┐  │   Upstream
//!   ◀─────────────┼──────────────────────┘◀────────│ link + deadline  │◀─┼──────────
//!   Client        │     raw response / 500         │ timer race       │  │
//!                 │                                └──────────────────┘  │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;

use keepalive_proxy::config::{load_config, ProxyConfig};
use keepalive_proxy::lifecycle::signals::spawn_signal_handler;
use keepalive_proxy::lifecycle::startup::build_runtime;
use keepalive_proxy::lifecycle::Shutdown;
use keepalive_proxy::net::Listener;
use keepalive_proxy::observability::{logging, metrics};
use keepalive_proxy::ProxyServer;

/// Grace period for in-flight sessions once the acceptor has stopped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "keepalive-proxy", version)]
#[command(about = "Single-upstream HTTP/1.1 keep-alive reverse proxy", long_about = None)]
struct Cli {
    /// Port to accept downstream connections on.
    port: u16,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("keepalive-proxy: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    config.listener = config.listener.with_port(cli.port);

    logging::init_logging(&config.observability.log_level);
    tracing::info!(port = cli.port, "keepalive-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let runtime = build_runtime(&config.runtime)?;
    let result = runtime.block_on(serve(config));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    tracing::info!("Shutdown complete");
    result
}

async fn serve(config: ProxyConfig) -> Result<(), Box<dyn Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(Arc::clone(&shutdown));

    let server = ProxyServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await;
    Ok(())
}
