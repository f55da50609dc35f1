//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level so a single run can be made
//! more verbose without touching the config file.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global `tracing` subscriber.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("keepalive_proxy={level},proxy_probe={level}")));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_ids(true))
        .try_init();

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}
