//! Client-facing listener (spec §4.7–§4.9): each connection carries exactly
//! one verb replayed by the client after an NS redirect — READ, STREAM,
//! WRITE (which then enters edit mode), UNDO, CHECKPOINT, VIEWCHECKPOINT,
//! LISTCHECKPOINTS, REVERT, or SHUTDOWN.

use std::sync::Arc;
use std::time::Duration;

use docstore_common::error::ErrCode;
use docstore_common::protocol::{Reply, Request};
use docstore_common::wire::{
    read_request, stream_bytes_delayed, write_all_and_flush, write_line, write_reply,
};
use tokio::io::{AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::sentence::Document;
use crate::state::SsState;

pub async fn run_client_listener(state: Arc<SsState>, listener: TcpListener) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "client accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = service_client(state, stream).await {
                warn!(%addr, error = %e, "client connection ended with an error");
            }
        });
    }
}

async fn service_client(state: Arc<SsState>, mut stream: TcpStream) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);
    let request = match read_request(&mut reader).await? {
        Some(r) => r,
        None => return Ok(()),
    };

    match request.verb.as_str() {
        "READ" => handle_read(&state, &mut write_half, &request, false).await?,
        "STREAM" => handle_read(&state, &mut write_half, &request, true).await?,
        "WRITE" => handle_write(&state, &mut reader, &mut write_half, &request).await?,
        "UNDO" => handle_undo(&state, &mut write_half, &request).await?,
        "CHECKPOINT" => handle_checkpoint(&state, &mut write_half, &request).await?,
        "VIEWCHECKPOINT" => handle_viewcheckpoint(&state, &mut write_half, &request).await?,
        "LISTCHECKPOINTS" => handle_listcheckpoints(&state, &mut write_half, &request).await?,
        "REVERT" => handle_revert(&state, &mut write_half, &request).await?,
        "SHUTDOWN" => {
            write_reply(&mut write_half, &Reply::ack("SHUTDOWN")).await?;
            info!("received SHUTDOWN from name server");
            state.trigger_shutdown();
        }
        _ => write_reply(&mut write_half, &ErrCode::UnknownCmd.into()).await?,
    }
    Ok(())
}

async fn handle_read<W: AsyncWrite + Unpin>(
    state: &Arc<SsState>,
    writer: &mut W,
    request: &Request,
    streaming: bool,
) -> std::io::Result<()> {
    let Some(name) = request.arg(0) else {
        return write_reply(writer, &ErrCode::NoFilename.into()).await;
    };
    match state.store.read(name).await {
        Ok(content) => {
            state.touch(name);
            if streaming {
                let delay = Duration::from_millis(state.config.stream_delay_millis);
                stream_bytes_delayed(writer, &content, delay).await
            } else {
                write_all_and_flush(writer, &content).await
            }
        }
        Err(_) => write_reply(writer, &ErrCode::FileNotFound.into()).await,
    }
}

async fn handle_write<R, W>(
    state: &Arc<SsState>,
    reader: &mut R,
    writer: &mut W,
    request: &Request,
) -> std::io::Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (Some(name), Some(sentence_arg)) = (request.arg(0), request.arg(1)) else {
        return write_reply(writer, &ErrCode::InvalidArgs.into()).await;
    };
    let Ok(sentence_index) = sentence_arg.parse::<usize>() else {
        return write_reply(writer, &ErrCode::InvalidArgs.into()).await;
    };
    if sentence_index == 0 {
        return write_reply(writer, &ErrCode::InvalidArgs.into()).await;
    }

    let original = state.store.read(name).await.unwrap_or_default();
    let document = Document::parse(&String::from_utf8_lossy(&original));
    if !document.sentence_index_valid(sentence_index) {
        return write_reply(writer, &ErrCode::InvalidArgs.into()).await;
    }
    if !state.locks.try_lock(name, sentence_index) {
        return write_reply(writer, &ErrCode::FileLocked.into()).await;
    }

    write_reply(writer, &Reply::ack("WRITE_LOCKED")).await?;

    let mut working = document.working_copy(sentence_index);
    let mut committed = false;
    loop {
        let next = match read_request(reader).await {
            Ok(Some(r)) => r,
            Ok(None) | Err(_) => break,
        };
        if next.verb == "ETIRW" {
            committed = true;
            break;
        }
        let Ok(word_index) = next.verb.parse::<usize>() else {
            write_reply(writer, &ErrCode::InvalidArgs.into()).await?;
            continue;
        };
        let content = next.args.join(" ");
        match working.apply_word_edit(word_index, &content) {
            Ok(()) => write_reply(writer, &Reply::ack("WORD_EDIT")).await?,
            Err(_) => write_reply(writer, &ErrCode::InvalidArgs.into()).await?,
        }
    }

    if !committed {
        // Connection dropped before ETIRW: discard edits (spec §4.8 step 6).
        state.locks.unlock(name, sentence_index);
        return Ok(());
    }

    let mut final_doc = document;
    final_doc.commit_sentence(sentence_index, working);
    let rendered = final_doc.render();
    state.store.write(name, rendered.as_bytes()).await.ok();
    state.undo.snapshot(name, original);
    state.locks.unlock(name, sentence_index);
    state.touch(name);
    write_reply(writer, &Reply::ack("WRITE_SUCCESS")).await?;

    notify_modified(
        state,
        name,
        rendered.len() as u64,
        final_doc.word_count() as u64,
        final_doc.char_count() as u64,
    )
    .await;
    Ok(())
}

async fn notify_modified(state: &Arc<SsState>, name: &str, size: u64, words: u64, chars: u64) {
    let last_access = state.last_access(name);
    let line = format!(
        "NM_FILE_MODIFIED {name} {} {size} {words} {chars} {last_access}",
        state.config.ss_id
    );
    match TcpStream::connect((state.config.ns_command_host.as_str(), state.config.ns_command_port)).await
    {
        Ok(mut stream) => {
            if let Err(e) = write_line(&mut stream, &line).await {
                warn!(error = %e, "failed to notify name server of modification");
            }
        }
        Err(e) => warn!(error = %e, "name server unreachable for modification notice"),
    }
}

async fn handle_undo<W: AsyncWrite + Unpin>(
    state: &Arc<SsState>,
    writer: &mut W,
    request: &Request,
) -> std::io::Result<()> {
    let Some(name) = request.arg(0) else {
        return write_reply(writer, &ErrCode::NoFilename.into()).await;
    };
    match state.undo.take(name) {
        Some(previous) => {
            state.store.write(name, &previous).await.ok();
            write_reply(writer, &Reply::ack("UNDO_SUCCESS")).await
        }
        None => write_reply(writer, &ErrCode::FileNotFound.into()).await,
    }
}

async fn handle_checkpoint<W: AsyncWrite + Unpin>(
    state: &Arc<SsState>,
    writer: &mut W,
    request: &Request,
) -> std::io::Result<()> {
    let (Some(name), Some(tag)) = (request.arg(0), request.arg(1)) else {
        return write_reply(writer, &ErrCode::InvalidArgs.into()).await;
    };
    let content = state.store.read(name).await.unwrap_or_default();
    state.checkpoints.save(name, tag, content);
    write_reply(writer, &Reply::ack("CHECKPOINT")).await
}

async fn handle_viewcheckpoint<W: AsyncWrite + Unpin>(
    state: &Arc<SsState>,
    writer: &mut W,
    request: &Request,
) -> std::io::Result<()> {
    let (Some(name), Some(tag)) = (request.arg(0), request.arg(1)) else {
        return write_reply(writer, &ErrCode::InvalidArgs.into()).await;
    };
    match state.checkpoints.get(name, tag) {
        Some(bytes) => write_all_and_flush(writer, &bytes).await,
        None => write_reply(writer, &ErrCode::FileNotFound.into()).await,
    }
}

async fn handle_listcheckpoints<W: AsyncWrite + Unpin>(
    state: &Arc<SsState>,
    writer: &mut W,
    request: &Request,
) -> std::io::Result<()> {
    let Some(name) = request.arg(0) else {
        return write_reply(writer, &ErrCode::NoFilename.into()).await;
    };
    let tags = state.checkpoints.tags(name);
    write_reply(writer, &Reply::payload("LISTCHECKPOINTS", tags)).await
}

async fn handle_revert<W: AsyncWrite + Unpin>(
    state: &Arc<SsState>,
    writer: &mut W,
    request: &Request,
) -> std::io::Result<()> {
    let (Some(name), Some(tag)) = (request.arg(0), request.arg(1)) else {
        return write_reply(writer, &ErrCode::InvalidArgs.into()).await;
    };
    match state.checkpoints.get(name, tag) {
        Some(snapshot) => {
            let current = state.store.read(name).await.unwrap_or_default();
            state.undo.snapshot(name, current);
            state.store.write(name, &snapshot).await.ok();
            write_reply(writer, &Reply::ack("REVERT")).await
        }
        None => write_reply(writer, &ErrCode::FileNotFound.into()).await,
    }
}
