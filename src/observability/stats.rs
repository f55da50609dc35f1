//! Periodic counter report.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::net::connection::ProxyStats;

/// Log the proxy counters every `interval` until shutdown.
pub async fn run_reporter(
    stats: Arc<ProxyStats>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let s = stats.snapshot();
                tracing::info!(
                    session_counter = s.sessions_live,
                    session_sequence = s.sessions_total,
                    client_counter = s.links_live,
                    client_sequence = s.links_total,
                    exchanges = s.exchanges,
                    failures = s.failures,
                    timeouts = s.timeouts,
                    rejected = s.rejected,
                    "stats"
                );
            }
            _ = shutdown.recv() => {
                tracing::debug!("Stats reporter stopping");
                break;
            }
        }
    }
}
