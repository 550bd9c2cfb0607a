//! Thin line-oriented connection helpers shared by the Name Server and
//! Storage Server legs of a client session (spec §6.1).

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Sends one command line, `\n`-terminated.
pub async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    if !line.ends_with('\n') {
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}

/// Reads one reply: a header line, followed by `n` more lines if the
/// header's verb is in `payload_verbs` and its last token parses as a
/// count (spec §6.1 "multi-line payloads ... returned as a single
/// reply"). Returns the whole thing as display-ready text; `None` on EOF.
pub async fn read_reply<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    payload_verbs: &[&str],
) -> std::io::Result<Option<String>> {
    let mut header = String::new();
    if reader.read_line(&mut header).await? == 0 {
        return Ok(None);
    }
    let trimmed = header.trim_end_matches(['\n', '\r']);
    let mut out = trimmed.to_string();

    let mut tokens = trimmed.split_whitespace();
    if let Some(verb_token) = tokens.next() {
        if let Some(verb) = verb_token.strip_prefix("ACK_") {
            if payload_verbs.contains(&verb) {
                if let Some(count) = tokens.next().and_then(|t| t.parse::<usize>().ok()) {
                    for _ in 0..count {
                        let mut line = String::new();
                        reader.read_line(&mut line).await?;
                        out.push('\n');
                        out.push_str(line.trim_end_matches(['\n', '\r']));
                    }
                }
            }
        }
    }
    Ok(Some(out))
}

/// A parsed `ACK_<verb> <ip> <port>` redirect, if the header matches that
/// exact shape.
pub fn parse_redirect(header: &str) -> Option<(String, u16)> {
    let mut tokens = header.split_whitespace();
    let verb = tokens.next()?;
    if !verb.starts_with("ACK_") {
        return None;
    }
    let ip = tokens.next()?.to_string();
    let port = tokens.next()?.parse::<u16>().ok()?;
    if tokens.next().is_some() {
        return None;
    }
    Some((ip, port))
}

/// Copies all remaining bytes from `reader` to stdout (used by READ and
/// VIEWCHECKPOINT on the SS leg).
pub async fn drain_to_stdout<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        print!("{}", String::from_utf8_lossy(&buf[..n]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_parses_ip_and_port() {
        assert_eq!(parse_redirect("ACK_READ 127.0.0.1 9001"), Some(("127.0.0.1".to_string(), 9001)));
    }

    #[test]
    fn non_redirect_header_does_not_parse() {
        assert_eq!(parse_redirect("ACK_REQACCESS 1"), None);
        assert_eq!(parse_redirect("ERR_FILE_NOT_FOUND"), None);
    }

    #[tokio::test]
    async fn read_reply_follows_payload_header_count() {
        let data = b"ACK_VIEW 2\na.txt\nb.txt\n".to_vec();
        let mut cursor = std::io::Cursor::new(data);
        let text = read_reply(&mut cursor, &["VIEW"]).await.unwrap().unwrap();
        assert_eq!(text, "ACK_VIEW 2\na.txt\nb.txt");
    }

    #[tokio::test]
    async fn read_reply_leaves_non_payload_header_alone() {
        let data = b"ACK_REQACCESS 1\n".to_vec();
        let mut cursor = std::io::Cursor::new(data);
        let text = read_reply(&mut cursor, &["VIEW"]).await.unwrap().unwrap();
        assert_eq!(text, "ACK_REQACCESS 1");
    }
}
