//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keepalive_proxy::config::ProxyConfig;
use keepalive_proxy::net::connection::ProxyStats;
use keepalive_proxy::net::Listener;
use keepalive_proxy::{ProxyServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const BODY: &str = "ok";

/// How a mock upstream treats one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer every request with `Connection: keep-alive`.
    KeepAlive,
    /// Answer one request without keep-alive, then close.
    CloseAfterOne,
    /// Read requests and never answer.
    Silent,
    /// Announce an absurd `Content-Length`, send one body byte, then close.
    HugeLength,
}

/// A mock upstream and its accepted-connection count.
pub struct MockUpstream {
    pub addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }
}

/// Start a mock upstream whose `n`th connection (from 0) behaves as `plan(n)`.
pub async fn start_upstream<F>(plan: F) -> MockUpstream
where
    F: Fn(usize) -> Behavior + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepts);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_upstream(socket, plan(index)));
        }
    });

    MockUpstream { addr, accepts }
}

async fn serve_upstream(mut socket: TcpStream, behavior: Behavior) {
    let mut pending = Vec::new();
    loop {
        if !read_request_head(&mut socket, &mut pending).await {
            return;
        }
        let response = match behavior {
            Behavior::Silent => continue,
            Behavior::KeepAlive => format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: keep-alive\r\n\r\n{}",
                BODY.len(),
                BODY
            ),
            Behavior::HugeLength => {
                "HTTP/1.1 200 OK\r\nContent-Length: 1000000000000000\r\nConnection: keep-alive\r\n\r\nx"
                    .to_string()
            }
            Behavior::CloseAfterOne => format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                BODY.len(),
                BODY
            ),
        };
        if socket.write_all(response.as_bytes()).await.is_err() {
            return;
        }
        if matches!(behavior, Behavior::CloseAfterOne | Behavior::HugeLength) {
            let _ = socket.shutdown().await;
            return;
        }
    }
}

/// Consume one request head from `socket`. Returns false on EOF or error.
async fn read_request_head(socket: &mut TcpStream, pending: &mut Vec<u8>) -> bool {
    loop {
        if let Some(pos) = find(pending, b"\r\n\r\n") {
            pending.drain(..pos + 4);
            return true;
        }
        let mut chunk = [0u8; 1024];
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return false,
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Proxy config pointed at `upstream`, bound to an ephemeral local port.
pub fn proxy_config(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.address = upstream.ip().to_string();
    config.upstream.port = upstream.port();
    config.upstream.host = "upstream.test".to_string();
    config.timeouts.exchange_ms = 200;
    config.observability.stats_interval_secs = 0;
    config
}

/// A proxy running in the background.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub stats: Arc<ProxyStats>,
    pub shutdown: Arc<Shutdown>,
    pub handle: JoinHandle<()>,
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ProxyServer::new(config).unwrap();
    let stats = server.stats();
    let shutdown = Arc::new(Shutdown::new());
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    RunningProxy {
        addr,
        stats,
        shutdown,
        handle,
    }
}

/// A response as the downstream client saw it.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub head: String,
    pub body: String,
}

/// Send one GET on `stream` and read back a complete response.
pub async fn send_get(stream: &mut TcpStream, keep_alive: bool) -> Reply {
    let connection = if keep_alive { "keep-alive" } else { "close" };
    let request = format!(
        "GET /anything HTTP/1.1\r\nHost: proxy.test\r\nConnection: {}\r\n\r\n",
        connection
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    read_reply(stream).await
}

/// Read one response: head up to the blank line, then `Content-Length` bytes.
pub async fn read_reply(stream: &mut TcpStream) -> Reply {
    let mut buf = Vec::new();
    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let mut chunk = [0u8; 1024];
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .expect("response timed out")
            .unwrap();
        assert!(n > 0, "connection closed before a full response head");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().parse::<usize>().unwrap())
        .unwrap_or(0);

    while buf.len() < head_end + length {
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..head_end + length]).to_string();

    Reply { status, head, body }
}

/// True once the peer has closed `stream`.
pub async fn closed_by_peer(stream: &mut TcpStream) -> bool {
    let mut chunk = [0u8; 16];
    match tokio::time::timeout(Duration::from_secs(2), stream.read(&mut chunk)).await {
        Ok(Ok(0)) | Ok(Err(_)) => true,
        Ok(Ok(_)) | Err(_) => false,
    }
}
