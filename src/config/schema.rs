//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, admission ceiling).
    pub listener: ListenerConfig,

    /// The single upstream every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Worker pool sizing.
    pub runtime: RuntimeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrently live sessions. Connections past the ceiling
    /// are closed without a response.
    pub max_sessions: usize,

    /// Largest header block accepted on either side of the proxy.
    pub max_header_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_sessions: 10_000,
            max_header_bytes: 64 * 1024,
        }
    }
}

impl ListenerConfig {
    /// Replace the port of `bind_address`, keeping its host part.
    pub fn with_port(mut self, port: u16) -> Self {
        let host = match self.bind_address.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.bind_address.clone(),
        };
        self.bind_address = format!("{}:{}", host, port);
        self
    }
}

/// Upstream target, fixed for the lifetime of the process.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Value sent in the `Host` header.
    pub host: String,

    /// Request path sent upstream for every forwarded request.
    pub path: String,

    /// IP address to connect to.
    pub address: String,

    /// TCP port to connect to.
    pub port: u16,

    /// Value sent in the `User-Agent` header.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "nginx.org".to_string(),
            path: "/".to_string(),
            address: "95.211.80.227".to_string(),
            port: 80,
            user_agent: concat!("keepalive-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Resolve the configured address and port into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.address.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// `Host` header value; the port is only spelled out when it is not 80.
    pub fn host_header(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Hard deadline for one upstream exchange (connect + write + read),
    /// in milliseconds.
    pub exchange_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { exchange_ms: 1000 }
    }
}

impl TimeoutConfig {
    pub fn exchange(&self) -> Duration {
        Duration::from_millis(self.exchange_ms)
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads driving the reactor.
    /// Defaults to the available hardware parallelism.
    pub worker_threads: Option<usize>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Interval between counter reports in seconds. Zero disables the report.
    pub stats_interval_secs: u64,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stats_interval_secs: 1,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_omits_default_port() {
        let mut upstream = UpstreamConfig::default();
        assert_eq!(upstream.host_header(), "nginx.org");

        upstream.port = 8080;
        assert_eq!(upstream.host_header(), "nginx.org:8080");
    }

    #[test]
    fn with_port_keeps_host() {
        let listener = ListenerConfig::default().with_port(9000);
        assert_eq!(listener.bind_address, "0.0.0.0:9000");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            address = "127.0.0.1"
            port = 3000
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.port, 3000);
        assert_eq!(config.upstream.host, "nginx.org");
        assert_eq!(config.listener.max_sessions, 10_000);
        assert_eq!(config.timeouts.exchange_ms, 1000);
        assert_eq!(
            config.upstream.socket_addr().unwrap(),
            "127.0.0.1:3000".parse().unwrap()
        );
    }
}
