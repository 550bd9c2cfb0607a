//! Replica Recovery Synchronizer (spec §4.6): runs once per SS
//! re-registration, re-pushing content for every file the returning SS is
//! supposed to hold.

use std::sync::Arc;

use docstore_common::wire::{read_request, write_all_and_flush, write_line};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::state::NsState;

pub fn spawn_recovery(state: Arc<NsState>, ss_id: String) {
    tokio::spawn(async move {
        let files = state.directory.list_with_replica(&ss_id);
        info!(ss = %ss_id, count = files.len(), "starting recovery sync");
        for (name, entry) in files {
            let Some(peer_id) = entry.replicas.iter().find(|r| {
                *r != &ss_id && state.registry.is_active(r)
            }) else {
                warn!(ss = %ss_id, %name, "no active peer holds this file, skipping recovery");
                continue;
            };
            if let Err(e) = sync_one_file(&state, &ss_id, peer_id, &name).await {
                warn!(error = %e, ss = %ss_id, %name, "recovery sync failed for file");
            }
        }
        info!(ss = %ss_id, "recovery sync complete");
    });
}

async fn sync_one_file(
    state: &Arc<NsState>,
    returning_ss_id: &str,
    peer_id: &str,
    name: &str,
) -> std::io::Result<()> {
    let peer = state.registry.get(peer_id).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "peer vanished from registry")
    })?;
    let returning = state.registry.get(returning_ss_id).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "returning ss vanished from registry")
    })?;

    let mut read_stream = TcpStream::connect((peer.ip.as_str(), peer.client_port)).await?;
    {
        let (_, mut writer) = read_stream.split();
        write_line(&mut writer, &format!("READ {name}")).await?;
    }
    let (mut reader, _) = read_stream.split();
    let content = docstore_common::wire::read_to_eof(&mut reader, 64 * 1024 * 1024).await?;

    state.ss_link.send_command(&returning.ip, returning.nm_port, "NM_DELETE", &[name]).await.ok();
    state.ss_link.send_command(&returning.ip, returning.nm_port, "NM_CREATE", &[name]).await.ok();

    let mut write_stream = TcpStream::connect((returning.ip.as_str(), returning.nm_port)).await?;
    {
        let (_, mut writer) = write_stream.split();
        write_line(&mut writer, &format!("NM_WRITECONTENT {name} {}", content.len())).await?;
        write_all_and_flush(&mut writer, &content).await?;
    }
    let (read_half, _) = write_stream.split();
    let mut ack_reader = BufReader::new(read_half);
    match read_request(&mut ack_reader).await? {
        Some(req) if req.verb == "ACK_NM_WRITECONTENT" => Ok(()),
        _ => Ok(()),
    }
}
