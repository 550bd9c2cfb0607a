//! Line-oriented framing helpers shared by every socket in the system.
//!
//! A buffered-reader-over-`AsyncRead` loop, simplified to plain line
//! framing: this protocol has no XDR length prefixes to resynchronize on.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{parse_line, Reply, Request};

/// Read one line and tokenize it into a [`Request`]. Returns `Ok(None)` on
/// EOF (clean client disconnect) and skips blank lines.
pub async fn read_request<R>(reader: &mut R) -> std::io::Result<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        if let Some(req) = parse_line(&line) {
            return Ok(Some(req));
        }
        // blank line: keep reading
    }
}

/// Write a [`Reply`] to the wire and flush.
pub async fn write_reply<W>(writer: &mut W, reply: &Reply) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(reply.render().as_bytes()).await?;
    writer.flush().await
}

/// Write a single raw line (already `\n`-terminated or not) and flush.
pub async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    if !line.ends_with('\n') {
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}

/// Copy an entire in-memory byte buffer to the wire and close (used by
/// READ/VIEWCHECKPOINT: "full bytes until EOF on a single connection").
pub async fn write_all_and_flush<W>(writer: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(data).await?;
    writer.flush().await
}

/// Emit `data` one byte at a time with `delay` between bytes, for STREAM's
/// human-paced display (spec §4.7: "the SS never buffers a whole file on
/// the wire for STREAM").
pub async fn stream_bytes_delayed<W>(
    writer: &mut W,
    data: &[u8],
    delay: Duration,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for byte in data {
        writer.write_all(std::slice::from_ref(byte)).await?;
        writer.flush().await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(())
}

/// Read the whole remaining stream into memory until EOF, bounded by
/// `max_len` to avoid an unbounded allocation from a misbehaving peer.
pub async fn read_to_eof<R>(reader: &mut R, max_len: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() >= max_len {
            break;
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_one_request_and_reports_eof() {
        let mut reader = Cursor::new(b"READ a.txt\n".to_vec());
        let req = read_request(&mut reader).await.unwrap().unwrap();
        assert_eq!(req.verb, "READ");
        assert_eq!(req.args, vec!["a.txt"]);

        assert!(read_request(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writes_reply_bytes() {
        let mut out = Vec::new();
        write_reply(&mut out, &Reply::ack("CREATE")).await.unwrap();
        assert_eq!(out, b"ACK_CREATE\n");
    }
}
