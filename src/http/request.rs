//! Request parsing and construction.
//!
//! # Responsibilities
//! - Parse a downstream request head (method, URL, version, headers)
//! - Build the fixed GET request sent to the upstream

use crate::config::UpstreamConfig;
use crate::http::headers::{split_head, Headers, ParseError};

/// A parsed request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub version: String,
    pub headers: Headers,
    /// Bytes occupied by the head, terminator included.
    pub consumed: usize,
}

impl Request {
    pub fn keep_alive(&self) -> bool {
        self.headers.keep_alive()
    }
}

/// Parse the request head at the start of `buf`.
pub fn parse_request(buf: &[u8]) -> Result<Request, ParseError> {
    let (start_line, headers, consumed) = split_head(buf)?;

    let mut parts = start_line.split_whitespace();
    let (Some(method), Some(url), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::StartLine(start_line.to_string()));
    };

    Ok(Request {
        method: method.to_string(),
        url: url.to_string(),
        version: version.to_string(),
        headers,
        consumed,
    })
}

/// Render the request forwarded to the upstream for every downstream request.
pub fn build_upstream_request(upstream: &UpstreamConfig) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Accept: */*\r\n\
         User-Agent: {agent}\r\n\
         Connection: keep-alive\r\n\
         \r\n",
        path = upstream.path,
        host = upstream.host_header(),
        agent = upstream.user_agent,
    )
}
