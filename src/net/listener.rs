//! TCP listener for downstream connections.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections with TCP keep-alive and address reuse set
//! - Surface accept errors to the caller, which keeps accepting
//!
//! The session ceiling is not enforced here: a connection past the ceiling
//! is still accepted and then closed by its session without any I/O.

use std::net::SocketAddr;

use socket2::SockRef;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(std::io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),
}

/// The downstream accept socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let inner = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = inner.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_sessions = config.max_sessions,
            "Listener bound"
        );

        Ok(Self { inner })
    }

    /// Accept the next downstream connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::trace!(peer_addr = %addr, "Connection accepted");
        if let Err(e) = configure_accepted(&stream) {
            tracing::debug!(peer_addr = %addr, error = %e, "Socket options not applied");
        }
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}

fn configure_accepted(stream: &TcpStream) -> std::io::Result<()> {
    let socket = SockRef::from(stream);
    socket.set_reuse_address(true)?;
    socket.set_keepalive(true)
}
