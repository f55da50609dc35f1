//! A single reusable connection to the upstream.
//!
//! # Responsibilities
//! - Lazily (re)connect when the held socket is closed
//! - Run one GET exchange under a hard deadline
//! - Decide whether the socket survives for the next exchange
//!
//! # Exchange sequence
//! ```text
//! arm deadline → [connect] → write request → read head → [read body rest]
//!     → cancel deadline → keep socket iff no error, no timeout and the
//!       response said `Connection: keep-alive`
//! ```

use std::future::Future;
use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpSocket, TcpStream};

use crate::config::ProxyConfig;
use crate::http::headers::ParseError;
use crate::http::request::build_upstream_request;
use crate::http::response::{parse_response, Response};
use crate::http::wire::{read_at_least, read_head};
use crate::net::connection::{LinkGuard, LinkId, ProxyStats};
use crate::observability::metrics::{self, ExchangeOutcome};
use crate::resilience::DeadlineTimer;

/// Errors from one upstream exchange. Any of them leaves the link closed.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("upstream I/O failed: {0}")]
    Io(#[source] io::Error),
    #[error("upstream exchange timed out")]
    Timeout,
    #[error("malformed upstream response: {0}")]
    Parse(#[from] ParseError),
}

impl LinkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout)
    }
}

/// Everything a link needs to reach the upstream, computed once at startup.
#[derive(Debug, Clone)]
pub struct Target {
    pub addr: SocketAddr,
    pub request: Bytes,
    pub timeout: Duration,
    pub max_header_bytes: usize,
}

impl Target {
    pub fn from_config(config: &ProxyConfig) -> Result<Self, AddrParseError> {
        Ok(Self {
            addr: config.upstream.socket_addr()?,
            request: Bytes::from(build_upstream_request(&config.upstream)),
            timeout: config.timeouts.exchange(),
            max_header_bytes: config.listener.max_header_bytes,
        })
    }
}

/// Result of a successful exchange.
#[derive(Debug)]
pub struct Exchange {
    /// Response bytes exactly as read from the upstream.
    pub raw: Bytes,
    pub head: Response,
    /// Whether the link kept its socket open.
    pub reusable: bool,
}

/// One upstream connection slot. The socket may be closed between uses.
#[derive(Debug)]
pub struct Link {
    guard: LinkGuard,
    stream: Option<TcpStream>,
    timer: DeadlineTimer,
}

impl Link {
    pub fn new(stats: &Arc<ProxyStats>) -> Self {
        let guard = stats.track_link();
        tracing::debug!(link = %guard.id(), "Link created");
        Self {
            guard,
            stream: None,
            timer: DeadlineTimer::new(),
        }
    }

    pub fn id(&self) -> LinkId {
        self.guard.id()
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Drop the socket. The link stays usable and reconnects on next use.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(link = %self.id(), "Socket closed");
        }
    }

    /// Run one request/response exchange against `target`.
    ///
    /// On error the socket is closed; the link itself is always left in a
    /// state fit to go back to the pool.
    pub async fn exchange(&mut self, target: &Target) -> Result<Exchange, LinkError> {
        let started = Instant::now();
        let stats = Arc::clone(self.guard.stats());
        stats.record_exchange();

        tracing::trace!(link = %self.id(), timeout = ?target.timeout, "schedule timer");
        let _watcher = self.timer.arm(target.timeout);
        let result = self.run(target).await;
        self.timer.cancel();

        match result {
            Ok((raw, head)) => {
                let reusable = head.keep_alive();
                if !reusable {
                    tracing::debug!(link = %self.id(), "close keep-alive");
                    self.close();
                }
                let outcome = if reusable {
                    ExchangeOutcome::Reused
                } else {
                    ExchangeOutcome::Closed
                };
                metrics::record_exchange(outcome, started.elapsed());
                tracing::debug!(
                    link = %self.id(),
                    status = head.status_code,
                    bytes = raw.len(),
                    reusable,
                    "Exchange complete"
                );
                Ok(Exchange {
                    raw: raw.freeze(),
                    head,
                    reusable,
                })
            }
            Err(e) => {
                self.close();
                stats.record_failure(e.is_timeout());
                if e.is_timeout() {
                    metrics::record_exchange(ExchangeOutcome::TimedOut, started.elapsed());
                    tracing::warn!(link = %self.id(), timeout = ?target.timeout, "Upstream timeout");
                } else {
                    metrics::record_exchange(ExchangeOutcome::Failed, started.elapsed());
                    tracing::warn!(link = %self.id(), error = %e, "Upstream exchange failed");
                }
                Err(e)
            }
        }
    }

    async fn run(&mut self, target: &Target) -> Result<(BytesMut, Response), LinkError> {
        let id = self.id();
        let Self { stream, timer, .. } = self;

        if stream.is_none() {
            tracing::debug!(link = %id, addr = %target.addr, "schedule connect");
            match checkpoint(timer, connect(target.addr)).await {
                Ok(connected) => *stream = Some(connected),
                Err(LinkError::Io(source)) => {
                    return Err(LinkError::Connect {
                        addr: target.addr,
                        source,
                    })
                }
                Err(e) => return Err(e),
            }
        }
        let Some(socket) = stream.as_mut() else {
            return Err(LinkError::Io(io::ErrorKind::NotConnected.into()));
        };

        tracing::trace!(link = %id, bytes = target.request.len(), "schedule write");
        checkpoint(timer, socket.write_all(&target.request)).await?;

        tracing::trace!(link = %id, "schedule read head");
        let mut buf = BytesMut::with_capacity(4096);
        let head_end = checkpoint(timer, read_head(socket, &mut buf, target.max_header_bytes))
            .await?
            .ok_or_else(|| {
                LinkError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "upstream closed the connection before responding",
                ))
            })?;

        let head = parse_response(&buf)?;
        if let Some(content_length) = head.headers.content_length()? {
            let body_read = buf.len() - head_end;
            if body_read < content_length {
                tracing::trace!(link = %id, missing = content_length - body_read, "schedule read body");
                checkpoint(timer, read_at_least(socket, &mut buf, content_length - body_read)).await?;
            }
        }

        Ok((buf, head))
    }
}

/// Race one blocking step against the deadline.
///
/// The timed-out flag is consulted before the I/O result, so an operation
/// that fails because the deadline cut it short reports a timeout.
async fn checkpoint<T, F>(timer: &DeadlineTimer, io: F) -> Result<T, LinkError>
where
    F: Future<Output = io::Result<T>>,
{
    let result = tokio::select! {
        biased;
        _ = timer.fired() => None,
        result = io => Some(result),
    };

    if timer.timed_out() {
        return Err(LinkError::Timeout);
    }
    match result {
        Some(result) => result.map_err(LinkError::Io),
        None => Err(LinkError::Timeout),
    }
}

async fn connect(addr: SocketAddr) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.set_keepalive(true)?;
    socket.connect(addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn target(addr: SocketAddr, timeout: Duration) -> Target {
        let mut config = ProxyConfig::default();
        config.upstream.address = addr.ip().to_string();
        config.upstream.port = addr.port();
        config.timeouts.exchange_ms = timeout.as_millis() as u64;
        Target::from_config(&config).unwrap()
    }

    /// Accept one connection and answer each request with the next reply.
    async fn scripted_upstream(replies: Vec<Vec<&'static [u8]>>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            for reply in replies {
                let _ = socket.read(&mut buf).await;
                for chunk in reply {
                    socket.write_all(chunk).await.unwrap();
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        addr
    }

    #[tokio::test]
    async fn keep_alive_response_leaves_link_open() {
        let addr = scripted_upstream(vec![vec![
            &b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: keep-alive\r\n\r\nhi"[..],
        ]])
        .await;
        let stats = ProxyStats::new();
        let mut link = Link::new(&stats);

        let exchange = link.exchange(&target(addr, Duration::from_secs(2))).await.unwrap();
        assert!(exchange.reusable);
        assert!(link.is_open());
        assert_eq!(
            &exchange.raw[..],
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: keep-alive\r\n\r\nhi"
        );
    }

    #[tokio::test]
    async fn missing_keep_alive_closes_link() {
        let addr = scripted_upstream(vec![vec![&b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"[..]]]).await;
        let stats = ProxyStats::new();
        let mut link = Link::new(&stats);

        let exchange = link.exchange(&target(addr, Duration::from_secs(2))).await.unwrap();
        assert!(!exchange.reusable);
        assert!(!link.is_open());
    }

    #[tokio::test]
    async fn short_body_is_completed() {
        let addr = scripted_upstream(vec![vec![
            &b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: keep-alive\r\n\r\nhel"[..],
            &b"lo world"[..],
        ]])
        .await;
        let stats = ProxyStats::new();
        let mut link = Link::new(&stats);

        let exchange = link.exchange(&target(addr, Duration::from_secs(2))).await.unwrap();
        assert!(exchange.raw.ends_with(b"\r\n\r\nhello world"));
    }

    #[tokio::test]
    async fn absurd_content_length_waits_for_bytes_then_times_out() {
        let addr = scripted_upstream(vec![vec![
            &b"HTTP/1.1 200 OK\r\nContent-Length: 1000000000000000\r\nConnection: keep-alive\r\n\r\nx"[..],
        ]])
        .await;
        let stats = ProxyStats::new();
        let mut link = Link::new(&stats);

        let err = link
            .exchange(&target(addr, Duration::from_millis(300)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!link.is_open());
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let addr = scripted_upstream(vec![]).await;
        let stats = ProxyStats::new();
        let mut link = Link::new(&stats);

        let err = link
            .exchange(&target(addr, Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!link.is_open());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.timeouts, 1);
    }

    #[tokio::test]
    async fn refused_connect_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let stats = ProxyStats::new();
        let mut link = Link::new(&stats);
        let err = link
            .exchange(&target(addr, Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Connect { .. }));
        assert!(!link.is_open());
    }
}
