//! Heartbeat Listener + Failure Monitor (spec §4.5): short-lived,
//! SS-initiated connections to the NS's dedicated heartbeat port. Only
//! `HEARTBEAT` arrives here; `NM_FILE_MODIFIED` is a command-port
//! notification handled by the acceptor/worker pool (spec §6.1).

use std::sync::Arc;
use std::time::Duration;

use docstore_common::wire::read_request;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::state::NsState;

pub async fn run_heartbeat_listener(state: Arc<NsState>, listener: TcpListener) {
    loop {
        let (mut stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "heartbeat accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            let (read_half, _) = stream.split();
            let mut reader = BufReader::new(read_half);
            let request = match read_request(&mut reader).await {
                Ok(Some(req)) => req,
                Ok(None) => return,
                Err(err) => {
                    warn!(%addr, %err, "heartbeat connection read failed");
                    return;
                }
            };
            match request.verb.as_str() {
                "HEARTBEAT" => {
                    if let Some(ss_id) = request.arg(0) {
                        if state.registry.heartbeat(ss_id) {
                            info!(ss = ss_id, "storage server online again");
                        }
                    }
                }
                other => warn!(verb = other, "unrecognized heartbeat-port message"),
            }
        });
    }
}

/// Wakes every `heartbeat_interval` and flips any SS whose last heartbeat
/// is older than `failure_timeout` to inactive (spec §4.5).
pub async fn run_failure_monitor(state: Arc<NsState>) {
    let interval = Duration::from_secs(state.config.constants.heartbeat_interval_secs.max(1));
    let timeout = state.config.constants.failure_timeout_secs as i64;
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let failed = state.registry.sweep_failures(timeout);
        for ss_id in failed {
            warn!(ss = %ss_id, "storage server marked inactive after missed heartbeats");
        }
    }
}
