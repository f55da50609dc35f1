//! Downstream session: one accepted connection's request/response loop.
//!
//! # State machine
//! ```text
//! Reading ──▶ Forwarding ──▶ Writing ──┬──▶ Reading   (request said keep-alive)
//!                                      └──▶ Closed
//! ```
//! Any error ends the session. The socket is owned by the session and is
//! closed when the session is dropped, however the loop ended.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::http::headers::ParseError;
use crate::http::request::parse_request;
use crate::http::response::INTERNAL_SERVER_ERROR;
use crate::http::server::ProxyState;
use crate::http::wire::{discard_body, read_head};
use crate::net::connection::{SessionGuard, SessionId};

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("downstream I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("malformed request: {0}")]
    Parse(#[from] ParseError),
}

/// A downstream connection and its request loop.
pub struct Session<S = TcpStream> {
    /// `None` once the session was rejected at admission.
    socket: Option<S>,
    peer: SocketAddr,
    guard: SessionGuard,
    state: Arc<ProxyState>,
    buf: BytesMut,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Count the session and apply the admission ceiling.
    ///
    /// Past the ceiling the socket is closed right here; the session still
    /// exists but `run` does no I/O.
    pub fn new(socket: S, peer: SocketAddr, state: Arc<ProxyState>) -> Self {
        let guard = state.stats.track_session();
        tracing::debug!(session = %guard.id(), peer = %peer, "Session created");

        let socket = if guard.live_at_open() > state.max_sessions as u64 {
            tracing::warn!(
                session = %guard.id(),
                live = guard.live_at_open(),
                max_sessions = state.max_sessions,
                "FORCE CLOSE: session ceiling reached"
            );
            state.stats.record_rejection();
            drop(socket);
            None
        } else {
            Some(socket)
        };

        Self {
            socket,
            peer,
            guard,
            state,
            buf: BytesMut::with_capacity(4096),
        }
    }

    pub fn id(&self) -> SessionId {
        self.guard.id()
    }

    pub fn is_rejected(&self) -> bool {
        self.socket.is_none()
    }

    /// Serve requests until the peer stops asking for keep-alive, the peer
    /// disconnects, or something fails. Never returns an error.
    pub async fn run(mut self) {
        let id = self.id();
        if self.socket.is_none() {
            return;
        }

        match self.serve().await {
            Ok(rounds) => tracing::debug!(session = %id, peer = %self.peer, rounds, "Session done"),
            Err(SessionError::Io(e)) if is_disconnect(&e) => {
                tracing::debug!(session = %id, error = %e, "Peer disconnected")
            }
            Err(e) => tracing::warn!(session = %id, peer = %self.peer, error = %e, "Session failed"),
        }
    }

    async fn serve(&mut self) -> Result<usize, SessionError> {
        let id = self.guard.id();
        let state = Arc::clone(&self.state);
        let Some(socket) = self.socket.as_mut() else {
            return Ok(0);
        };
        let buf = &mut self.buf;

        let mut rounds = 0;
        loop {
            // Reading
            tracing::trace!(session = %id, round = rounds + 1, "schedule read");
            let Some(head_end) = read_head(socket, buf, state.max_header_bytes).await? else {
                return Ok(rounds);
            };
            let request = parse_request(buf)?;
            tracing::debug!(
                session = %id,
                method = %request.method,
                url = %request.url,
                bytes = head_end,
                "read"
            );
            buf.advance(head_end);
            if let Some(body) = request.headers.content_length()? {
                discard_body(socket, buf, body).await?;
            }

            // Forwarding
            let mut link = state.pool.acquire();
            let result = link.exchange(&state.target).await;
            state.pool.release(link);

            // Writing
            let reply: &[u8] = match &result {
                Ok(exchange) => &exchange.raw,
                Err(_) => INTERNAL_SERVER_ERROR,
            };
            tracing::trace!(session = %id, bytes = reply.len(), "schedule write");
            socket.write_all(reply).await?;
            socket.flush().await?;
            tracing::debug!(session = %id, bytes = reply.len(), status_ok = result.is_ok(), "write");

            rounds += 1;
            if !request.keep_alive() {
                tracing::debug!(session = %id, "close keep-alive");
                return Ok(rounds);
            }
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
