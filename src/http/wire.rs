//! Socket reads shaped around the HTTP/1.1 framing rules we support.

use std::io;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::headers::find_header_end;

const READ_CHUNK: usize = 4096;

/// Read into `buf` until it holds a complete header block.
///
/// Returns the offset just past the terminator, or `None` when the peer
/// closed the connection before sending anything.
pub async fn read_head<R>(reader: &mut R, buf: &mut BytesMut, limit: usize) -> io::Result<Option<usize>>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(end) = find_header_end(buf) {
            return Ok(Some(end));
        }
        if buf.len() >= limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("header block exceeds {} bytes", limit),
            ));
        }

        buf.reserve(READ_CHUNK);
        if reader.read_buf(buf).await? == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside header block",
            ));
        }
    }
}

/// Append at least `wanted` more bytes to `buf`, as one logical read.
///
/// Returns how many bytes were appended, which may exceed `wanted`. The
/// buffer grows with the bytes that arrive, not with `wanted`.
pub async fn read_at_least<R>(reader: &mut R, buf: &mut BytesMut, wanted: usize) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let start = buf.len();
    while buf.len() - start < wanted {
        buf.reserve(READ_CHUNK);
        if reader.read_buf(buf).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed after {} of {} body bytes", buf.len() - start, wanted),
            ));
        }
    }
    Ok(buf.len() - start)
}

/// Skip a `len` byte body: first whatever is already in `buf`, then the
/// rest straight from `reader` without buffering it.
pub async fn discard_body<R>(reader: &mut R, buf: &mut BytesMut, len: usize) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let buffered = buf.len().min(len);
    buf.advance(buffered);

    let remaining = (len - buffered) as u64;
    if remaining == 0 {
        return Ok(());
    }
    let skipped = tokio::io::copy(&mut (&mut *reader).take(remaining), &mut tokio::io::sink()).await?;
    if skipped < remaining {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("connection closed after {} of {} body bytes", buffered as u64 + skipped, len),
        ));
    }
    Ok(())
}
