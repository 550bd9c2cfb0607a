//! SS Link: the Name Server's outgoing connection to a Storage Server's
//! NM port (spec §4 "NM_*" commands). Mirrors the way the reference VFS
//! trait isolates wire concerns behind an async interface so the dispatch
//! layer never touches sockets directly.

use async_trait::async_trait;
use docstore_common::protocol::{Reply, Request};
use docstore_common::wire::{read_request, write_line};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

pub type SsLinkResult<T> = Result<T, SsLinkError>;

#[derive(Debug, Error)]
pub enum SsLinkError {
    #[error("could not reach storage server: {0}")]
    Unreachable(#[from] std::io::Error),
    #[error("storage server sent a malformed reply")]
    MalformedReply,
    #[error("storage server closed the connection")]
    ConnectionClosed,
}

/// A single command/reply round trip against a Storage Server's NM port.
#[async_trait]
pub trait SsLink: Sync + Send {
    async fn send_command(
        &self,
        ip: &str,
        nm_port: u16,
        verb: &str,
        args: &[&str],
    ) -> SsLinkResult<Reply>;
}

/// Real `SsLink` backed by a fresh `TcpStream` per call, matching the
/// Storage Server's "short NM connection per command" wire shape
/// (spec §4.6/§4.7: `NM_CREATE`, `NM_DELETE`, `NM_CHECK_LOCKS`, ...).
pub struct TcpSsLink;

#[async_trait]
impl SsLink for TcpSsLink {
    async fn send_command(
        &self,
        ip: &str,
        nm_port: u16,
        verb: &str,
        args: &[&str],
    ) -> SsLinkResult<Reply> {
        let mut stream = TcpStream::connect((ip, nm_port)).await?;
        let mut line = verb.to_string();
        for a in args {
            line.push(' ');
            line.push_str(a);
        }
        line.push('\n');
        {
            let (_, mut writer) = stream.split();
            write_line(&mut writer, &line).await?;
        }
        let mut reader = BufReader::new(stream);
        let request = read_request(&mut reader).await?.ok_or(SsLinkError::ConnectionClosed)?;
        reply_from_ack_line(&request)
    }
}

/// Reinterprets a tokenized ACK/ERR line as a [`Reply`]. The NM-facing
/// wire only ever returns `ACK_<VERB>`, `ACK_<VERB> <args...>`, or
/// `ERR_<code>`; payload framing (as used on the client-facing port) does
/// not occur here.
fn reply_from_ack_line(request: &Request) -> SsLinkResult<Reply> {
    if let Some(code) = request.verb.strip_prefix("ERR_") {
        return docstore_common::ErrCode::from_suffix(code)
            .map(Reply::Err)
            .ok_or(SsLinkError::MalformedReply);
    }
    if request.args.is_empty() {
        Ok(Reply::Ack(request.verb.clone()))
    } else {
        Ok(Reply::AckArgs(request.verb.clone(), request.args.clone()))
    }
}

