//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, ceilings > 0)
//! - Check the upstream target is something we can connect to without DNS
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),
    #[error("listener.max_sessions must be greater than zero")]
    ZeroSessions,
    #[error("listener.max_header_bytes must be greater than zero")]
    ZeroHeaderLimit,
    #[error("upstream.host must not be empty")]
    EmptyHost,
    #[error("upstream.path '{0}' must start with '/'")]
    RelativePath(String),
    #[error("upstream.address '{0}' is not an IP address")]
    UpstreamAddress(String),
    #[error("upstream.port must be greater than zero")]
    ZeroPort,
    #[error("timeouts.exchange_ms must be greater than zero")]
    ZeroTimeout,
    #[error("runtime.worker_threads must be greater than zero")]
    ZeroWorkers,
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_sessions == 0 {
        errors.push(ValidationError::ZeroSessions);
    }
    if config.listener.max_header_bytes == 0 {
        errors.push(ValidationError::ZeroHeaderLimit);
    }

    let upstream = &config.upstream;
    if upstream.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if !upstream.path.starts_with('/') {
        errors.push(ValidationError::RelativePath(upstream.path.clone()));
    }
    if upstream.address.parse::<std::net::IpAddr>().is_err() {
        errors.push(ValidationError::UpstreamAddress(upstream.address.clone()));
    }
    if upstream.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    if config.timeouts.exchange_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.runtime.worker_threads == Some(0) {
        errors.push(ValidationError::ZeroWorkers);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = ProxyConfig::default();
        config.upstream.address = "nginx.org".into();
        config.upstream.path = "index.html".into();
        config.timeouts.exchange_ms = 0;
        config.runtime.worker_threads = Some(0);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::RelativePath("index.html".into()),
                ValidationError::UpstreamAddress("nginx.org".into()),
                ValidationError::ZeroTimeout,
                ValidationError::ZeroWorkers,
            ]
        );
    }
}
