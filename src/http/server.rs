//! Proxy server: accept loop and session dispatch.
//!
//! # Responsibilities
//! - Own the state every session shares (link pool, upstream target, counters)
//! - Accept downstream connections and spawn one session task per connection
//! - Keep accepting through accept errors
//! - Stop accepting on shutdown
//! - Run the periodic stats report

use std::net::AddrParseError;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::http::session::Session;
use crate::net::connection::ProxyStats;
use crate::net::listener::Listener;
use crate::observability::stats::run_reporter;
use crate::upstream::{LinkPool, Target};

/// State shared by every session.
#[derive(Debug)]
pub struct ProxyState {
    pub pool: LinkPool,
    pub target: Target,
    pub stats: Arc<ProxyStats>,
    pub max_sessions: usize,
    pub max_header_bytes: usize,
}

impl ProxyState {
    pub fn from_config(config: &ProxyConfig, stats: Arc<ProxyStats>) -> Result<Self, AddrParseError> {
        Ok(Self {
            pool: LinkPool::new(Arc::clone(&stats)),
            target: Target::from_config(config)?,
            stats,
            max_sessions: config.listener.max_sessions,
            max_header_bytes: config.listener.max_header_bytes,
        })
    }
}

/// The downstream-facing proxy server.
pub struct ProxyServer {
    state: Arc<ProxyState>,
    config: ProxyConfig,
}

impl ProxyServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, AddrParseError> {
        let state = ProxyState::from_config(&config, ProxyStats::new())?;
        Ok(Self {
            state: Arc::new(state),
            config,
        })
    }

    pub fn stats(&self) -> Arc<ProxyStats> {
        Arc::clone(&self.state.stats)
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.config.observability.stats_interval_secs;
        if interval > 0 {
            tokio::spawn(run_reporter(
                self.stats(),
                Duration::from_secs(interval),
                shutdown.resubscribe(),
            ));
        }

        tracing::info!(
            upstream = %self.state.target.addr,
            host = %self.config.upstream.host,
            path = %self.config.upstream.path,
            timeout = ?self.state.target.timeout,
            "Proxy server starting"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let session = Session::new(stream, peer, Arc::clone(&self.state));
                        tokio::spawn(session.run());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Acceptor stopping");
                    break;
                }
            }
        }

        tracing::info!(live_sessions = self.state.stats.live_sessions(), "Proxy server stopped");
    }
}
