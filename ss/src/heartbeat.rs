//! Heartbeat emitter (spec §4.5): a short-lived connection to the NS
//! heartbeat port every `HEARTBEAT_INTERVAL` seconds.

use std::sync::Arc;

use docstore_common::wire::write_line;
use tokio::net::TcpStream;
use tracing::warn;

use crate::state::SsState;

pub async fn run_heartbeat_emitter(state: Arc<SsState>) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(state.config.constants.heartbeat_interval_secs.max(1)));
    let mut shutdown_rx = state.subscribe_shutdown();
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => send_heartbeat(&state).await,
        }
    }
}

async fn send_heartbeat(state: &Arc<SsState>) {
    let line = format!("HEARTBEAT {}", state.config.ss_id);
    match TcpStream::connect((state.config.ns_heartbeat_host.as_str(), state.config.ns_heartbeat_port)).await {
        Ok(mut stream) => {
            if let Err(e) = write_line(&mut stream, &line).await {
                warn!(error = %e, "failed to send heartbeat");
            }
        }
        Err(e) => warn!(error = %e, "name server unreachable for heartbeat"),
    }
}
