//! Response parsing.
//!
//! # Responsibilities
//! - Parse an upstream response head (version, status, headers)
//! - Provide the canned reply sent when the upstream exchange fails

use crate::http::headers::{split_head, Headers, ParseError};

/// Sent downstream whenever the upstream exchange fails. No body.
pub const INTERNAL_SERVER_ERROR: &[u8] = b"HTTP/1.1 500 Internal Server Error\r\n\r\n";

/// A parsed response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: String,
    pub status_code: u16,
    pub status_message: String,
    pub headers: Headers,
    /// Bytes occupied by the head, terminator included.
    pub consumed: usize,
}

impl Response {
    pub fn keep_alive(&self) -> bool {
        self.headers.keep_alive()
    }
}

/// Parse the response head at the start of `buf`.
pub fn parse_response(buf: &[u8]) -> Result<Response, ParseError> {
    let (start_line, headers, consumed) = split_head(buf)?;

    let mut parts = start_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    let code = parts.next().unwrap_or_default();
    let message = parts.next().unwrap_or_default();

    if version.is_empty() {
        return Err(ParseError::StartLine(start_line.to_string()));
    }
    let status_code = code
        .parse::<u16>()
        .map_err(|_| ParseError::StatusCode(code.to_string()))?;

    Ok(Response {
        version: version.to_string(),
        status_code,
        status_message: message.trim().to_string(),
        headers,
        consumed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_response_head() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: keep-alive\r\n\r\nhi";
        let response = parse_response(raw).unwrap();

        assert_eq!(response.version, "HTTP/1.1");
        assert_eq!(response.status_code, 200);
        assert_eq!(response.status_message, "OK");
        assert_eq!(response.headers.content_length(), Ok(Some(2)));
        assert!(response.keep_alive());
        assert_eq!(response.consumed, raw.len() - 2);
    }

    #[test]
    fn multi_word_reason_phrase() {
        let response = parse_response(INTERNAL_SERVER_ERROR).unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.status_message, "Internal Server Error");
        assert!(response.headers.is_empty());
    }

    #[test]
    fn non_numeric_status() {
        assert_eq!(
            parse_response(b"HTTP/1.1 abc OK\r\n\r\n"),
            Err(ParseError::StatusCode("abc".into()))
        );
    }

    #[test]
    fn incomplete_head() {
        assert_eq!(
            parse_response(b"HTTP/1.1 200 OK\r\n"),
            Err(ParseError::Incomplete)
        );
    }
}
