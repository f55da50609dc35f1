//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_live_sessions` (gauge): downstream sessions currently open
//! - `proxy_live_links` (gauge): upstream links alive (pooled or borrowed)
//! - `proxy_exchanges_total` (counter): upstream exchanges by outcome
//! - `proxy_exchange_duration_seconds` (histogram): exchange latency
//! - `proxy_rejected_sessions_total` (counter): admission-ceiling rejections
//!
//! Updates go through the `metrics` facade, so they are no-ops until a
//! recorder is installed by [`init_metrics`].

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics recorder"),
    }
}

/// Outcome label for one upstream exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Reused,
    Closed,
    Failed,
    TimedOut,
}

impl ExchangeOutcome {
    fn label(self) -> &'static str {
        match self {
            ExchangeOutcome::Reused => "reused",
            ExchangeOutcome::Closed => "closed",
            ExchangeOutcome::Failed => "failed",
            ExchangeOutcome::TimedOut => "timeout",
        }
    }
}

pub fn record_exchange(outcome: ExchangeOutcome, elapsed: Duration) {
    metrics::counter!("proxy_exchanges_total", "outcome" => outcome.label()).increment(1);
    metrics::histogram!("proxy_exchange_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_rejected_session() {
    metrics::counter!("proxy_rejected_sessions_total").increment(1);
}

pub fn set_live_sessions(live: u64) {
    metrics::gauge!("proxy_live_sessions").set(live as f64);
}

pub fn set_live_links(live: u64) {
    metrics::gauge!("proxy_live_links").set(live as f64);
}
