//! NM-facing listener (spec §4.8, §6.1): the Name Server's administrative
//! channel into this SS — create/delete/move/lock-check/stats, and the
//! raw-payload `NM_WRITECONTENT` used by replication and recovery.

use std::sync::Arc;

use docstore_common::error::ErrCode;
use docstore_common::protocol::Reply;
use docstore_common::wire::{read_request, write_line, write_reply};
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::sentence::Document;
use crate::state::SsState;

pub async fn run_nm_listener(state: Arc<SsState>, listener: TcpListener) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "NM accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = service_nm(state, stream).await {
                warn!(%addr, error = %e, "NM connection ended with an error");
            }
        });
    }
}

async fn service_nm(state: Arc<SsState>, mut stream: TcpStream) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);
    let request = match read_request(&mut reader).await? {
        Some(r) => r,
        None => return Ok(()),
    };

    match request.verb.as_str() {
        "NM_CREATE" => {
            let Some(name) = request.arg(0) else {
                return write_reply(&mut write_half, &ErrCode::NoFilename.into()).await;
            };
            let reply = match state.store.create_file(name).await {
                Ok(()) => Reply::ack("NM_CREATE"),
                Err(_) => ErrCode::SsCreateFailed.into(),
            };
            write_reply(&mut write_half, &reply).await
        }
        "NM_DELETE" => {
            let Some(name) = request.arg(0) else {
                return write_reply(&mut write_half, &ErrCode::NoFilename.into()).await;
            };
            state.locks.unlock_all(name);
            state.undo.clear(name);
            state.checkpoints.clear_file(name);
            let reply = match state.store.delete(name).await {
                Ok(()) => Reply::ack("NM_DELETE"),
                Err(_) => ErrCode::SsDeleteFailed.into(),
            };
            write_reply(&mut write_half, &reply).await
        }
        "NM_CREATEFOLDER" => {
            let Some(name) = request.arg(0) else {
                return write_reply(&mut write_half, &ErrCode::NoFilename.into()).await;
            };
            let reply = match state.store.create_folder(name).await {
                Ok(()) => Reply::ack("NM_CREATEFOLDER"),
                Err(_) => ErrCode::SsCreatefolderFailed.into(),
            };
            write_reply(&mut write_half, &reply).await
        }
        "NM_MOVE" => {
            let (Some(src), Some(dest)) = (request.arg(0), request.arg(1)) else {
                return write_reply(&mut write_half, &ErrCode::InvalidArgs.into()).await;
            };
            let reply = match state.store.move_entry(src, dest).await {
                Ok(()) => Reply::ack("NM_MOVE"),
                Err(_) => ErrCode::SsMoveFailed.into(),
            };
            write_reply(&mut write_half, &reply).await
        }
        "NM_CHECK_LOCKS" => {
            let Some(name) = request.arg(0) else {
                return write_reply(&mut write_half, &ErrCode::NoFilename.into()).await;
            };
            let token = if state.locks.is_locked(name) { "FILE_LOCKED" } else { "FILE_UNLOCKED" };
            write_line(&mut write_half, token).await
        }
        "NM_GETSIZE" => {
            let Some(name) = request.arg(0) else {
                return write_reply(&mut write_half, &ErrCode::NoFilename.into()).await;
            };
            let size = state.store.size(name).await.unwrap_or(0);
            write_line(&mut write_half, &format!("SIZE {size}")).await
        }
        "NM_GETSTATS" => {
            let Some(name) = request.arg(0) else {
                return write_reply(&mut write_half, &ErrCode::NoFilename.into()).await;
            };
            let content = state.store.read(name).await.unwrap_or_default();
            let document = Document::parse(&String::from_utf8_lossy(&content));
            let atime = state.last_access(name);
            write_line(
                &mut write_half,
                &format!(
                    "STATS {} {} {} {atime}",
                    content.len(),
                    document.word_count(),
                    document.char_count()
                ),
            )
            .await
        }
        "NM_WRITECONTENT" => {
            let (Some(name), Some(len_arg)) = (request.arg(0), request.arg(1)) else {
                return write_reply(&mut write_half, &ErrCode::InvalidArgs.into()).await;
            };
            let Ok(len) = len_arg.parse::<usize>() else {
                return write_reply(&mut write_half, &ErrCode::InvalidArgs.into()).await;
            };
            let name = name.to_string();
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            let reply = match state.store.write(&name, &buf).await {
                Ok(()) => Reply::ack("NM_WRITECONTENT"),
                Err(_) => ErrCode::SsCreateFailed.into(),
            };
            write_reply(&mut write_half, &reply).await
        }
        "SHUTDOWN" => {
            write_reply(&mut write_half, &Reply::ack("SHUTDOWN")).await?;
            info!("received SHUTDOWN on NM port");
            state.trigger_shutdown();
            Ok(())
        }
        _ => write_reply(&mut write_half, &ErrCode::UnknownCmd.into()).await,
    }
}
