//! Connection controller: the two behaviors that bypass normal response
//! writing.
//!
//! - `abrupt_close`: take the connection and close it with zero bytes written
//! - `raw_replace`: take the connection and write the request body back,
//!   split on the literal two-character sequence `\n`, one line per segment
//!
//! Both are terminal for the connection. Once either has taken the
//! connection, whatever response the handler returns is never written.

use tokio::io::{AsyncWriteExt, BufWriter};

use crate::net::takeover::{ConnectionHandle, TakeoverError};

const ESCAPED_NEWLINE: &[u8] = b"\\n";

/// Close the connection without writing a single byte.
pub async fn abrupt_close(connection: Option<&ConnectionHandle>) -> Result<(), TakeoverError> {
    let handle = connection.ok_or(TakeoverError::Unavailable)?;
    let mut raw = handle.take_raw()?;
    raw.shutdown().await?;
    tracing::debug!("Connection closed without response");
    Ok(())
}

/// Split `body` on the escaped newline token.
pub fn segments(body: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    let mut rest = body;
    while let Some(at) = rest
        .windows(ESCAPED_NEWLINE.len())
        .position(|window| window == ESCAPED_NEWLINE)
    {
        segments.push(&rest[..at]);
        rest = &rest[at + ESCAPED_NEWLINE.len()..];
    }
    segments.push(rest);
    segments
}

/// The exact bytes `raw_replace` puts on the wire for `body`.
pub fn replacement_bytes(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 1);
    for segment in segments(body) {
        out.extend_from_slice(segment);
        out.push(b'\n');
    }
    out
}

/// Write the transformed request body straight to the connection, then
/// flush and close it. Returns the number of bytes written.
pub async fn raw_replace(
    connection: Option<&ConnectionHandle>,
    body: &[u8],
) -> Result<usize, TakeoverError> {
    let handle = connection.ok_or(TakeoverError::Unavailable)?;
    let raw = handle.take_raw()?;

    let mut writer = BufWriter::new(raw);
    let mut written = 0;
    for segment in segments(body) {
        writer.write_all(segment).await?;
        writer.write_all(b"\n").await?;
        written += segment.len() + 1;
    }
    writer.flush().await?;
    writer.shutdown().await?;

    tracing::debug!(bytes = written, "Raw replacement written");
    Ok(written)
}
