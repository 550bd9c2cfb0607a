//! Replication Engine (spec §4.10): CREATE-time fan-out of an empty file
//! to secondary replicas, and the `NM_FILE_MODIFIED`-triggered content push
//! that keeps replicas eventually consistent.

use std::sync::Arc;

use docstore_common::wire::{read_request, write_all_and_flush, write_line};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::warn;

use crate::registry::SsInfo;
use crate::state::NsState;

/// Fire-and-forget: recreate `name` on every replica after index 0, which
/// already has it from the synchronous primary call in `create()` (spec
/// §4.4 CREATE row: "async tasks recreate file on replicas").
pub fn spawn_create_fanout(state: Arc<NsState>, name: String, replicas: Vec<String>, verb: String) {
    if replicas.len() <= 1 {
        return;
    }
    tokio::spawn(async move {
        for ss_id in &replicas[1..] {
            let Some(info) = state.registry.get(ss_id) else { continue };
            if !info.is_active {
                continue;
            }
            if let Err(e) =
                state.ss_link.send_command(&info.ip, info.nm_port, &verb, &[&name]).await
            {
                warn!(error = %e, ss = %ss_id, %name, "create fan-out failed");
            }
        }
    });
}

/// Handles an `NM_FILE_MODIFIED name ss_id size words chars last_access`
/// notification: updates the directory's live stats, then pushes the new
/// content to every other replica (spec §4.10).
pub async fn handle_file_modified(
    state: Arc<NsState>,
    name: String,
    source_ss_id: String,
    size: u64,
    words: u64,
    chars: u64,
    last_access: i64,
) {
    state.directory.update_stats(&name, size, words, chars, last_access);
    state.directory.persist().await;
    tokio::spawn(async move {
        let Some(entry) = state.directory.find_any(&name) else { return };
        let Some(source) = state.registry.get(&source_ss_id) else { return };
        if !source.is_active {
            return;
        }
        let peers: Vec<String> =
            entry.replicas.iter().filter(|r| *r != &source_ss_id).cloned().collect();
        if peers.is_empty() {
            return;
        }
        let content = match fetch_content(&source, &name).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, %name, "could not read modified content from source replica");
                return;
            }
        };
        for peer_id in peers {
            let Some(peer) = state.registry.get(&peer_id) else { continue };
            if !peer.is_active {
                continue;
            }
            if let Err(e) = push_to_replica(&state, &peer, &name, &content).await {
                warn!(error = %e, ss = %peer_id, %name, "replication push failed");
            }
        }
    });
}

async fn fetch_content(source: &SsInfo, name: &str) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect((source.ip.as_str(), source.client_port)).await?;
    {
        let (_, mut writer) = stream.split();
        write_line(&mut writer, &format!("READ {name}")).await?;
    }
    let (mut reader, _) = stream.split();
    docstore_common::wire::read_to_eof(&mut reader, 64 * 1024 * 1024).await
}

async fn push_to_replica(
    state: &Arc<NsState>,
    peer: &SsInfo,
    name: &str,
    content: &[u8],
) -> std::io::Result<()> {
    if let Err(e) = state.ss_link.send_command(&peer.ip, peer.nm_port, "NM_DELETE", &[name]).await
    {
        warn!(error = %e, "stale-copy delete before replication push failed, continuing");
    }
    state.ss_link.send_command(&peer.ip, peer.nm_port, "NM_CREATE", &[name]).await.ok();

    let mut stream = TcpStream::connect((peer.ip.as_str(), peer.nm_port)).await?;
    {
        let (_, mut writer) = stream.split();
        write_line(&mut writer, &format!("NM_WRITECONTENT {name} {}", content.len())).await?;
        write_all_and_flush(&mut writer, content).await?;
    }
    let (read_half, _) = stream.split();
    let mut reader = BufReader::new(read_half);
    match read_request(&mut reader).await? {
        Some(req) if req.verb == "ACK_NM_WRITECONTENT" => Ok(()),
        Some(req) => {
            warn!(verb = %req.verb, "unexpected reply to NM_WRITECONTENT");
            Ok(())
        }
        None => Ok(()),
    }
}
