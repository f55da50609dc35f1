//! Header block primitives shared by the request and response parsers.
//!
//! Header lines without a colon are skipped rather than rejected; the
//! keep-alive checks upstream and downstream depend on that leniency.

use thiserror::Error;

/// The 4-byte sequence terminating every header block.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors produced while parsing a start line or header block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("header block is not terminated by CRLFCRLF")]
    Incomplete,
    #[error("header block is not valid UTF-8")]
    Encoding,
    #[error("malformed start line: {0:?}")]
    StartLine(String),
    #[error("invalid status code: {0:?}")]
    StatusCode(String),
    #[error("invalid Content-Length: {0:?}")]
    ContentLength(String),
}

/// Position just past the header terminator, if the buffer holds one.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// Ordered header list with case-insensitive lookup.
///
/// A repeated name keeps every occurrence; lookups return the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Value of the last header called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the `Connection` header asks to keep the connection open.
    pub fn keep_alive(&self) -> bool {
        self.get("Connection")
            .map(|value| value.eq_ignore_ascii_case("keep-alive"))
            .unwrap_or(false)
    }

    /// Parsed `Content-Length`, `None` when the header is absent.
    pub fn content_length(&self) -> Result<Option<usize>, ParseError> {
        match self.get("Content-Length") {
            None => Ok(None),
            Some(raw) => raw
                .parse::<usize>()
                .map(Some)
                .map_err(|_| ParseError::ContentLength(raw.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a complete header block into its start line and header lines.
///
/// Returns the start line, the parsed headers and the number of bytes the
/// block occupies (terminator included).
pub(crate) fn split_head(buf: &[u8]) -> Result<(&str, Headers, usize), ParseError> {
    let end = find_header_end(buf).ok_or(ParseError::Incomplete)?;
    let head = std::str::from_utf8(&buf[..end - HEADER_TERMINATOR.len()])
        .map_err(|_| ParseError::Encoding)?;

    let mut lines = head.split("\r\n");
    let start_line = lines.next().unwrap_or_default();

    let mut headers = Headers::new();
    for line in lines {
        // Lines without a colon are dropped silently.
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim(), value.trim());
        }
    }

    Ok((start_line, headers, end))
}
