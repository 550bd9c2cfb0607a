//! Name Server binary: wires together the trie directory, SS registry,
//! lookup cache, session table, request queue, acceptor/worker pool, and
//! the heartbeat/failure-detection and replication background tasks
//! (spec §2, §5 Shutdown).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use docstore_common::config::NsConfig;
use docstore_common::wire::{read_request, write_line};
use docstore_ns::acceptor::{self, TaskQueue};
use docstore_ns::heartbeat;
use docstore_ns::state::NsState;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "ns")]
#[command(about = "Name Server: directory, ACLs, replication, and redirection")]
struct Args {
    /// Path to a TOML config file; missing file falls back to defaults.
    #[arg(short, long, default_value = "ns.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = NsConfig::load(&args.config);
    let state = NsState::new(config);

    let command_listener =
        match TcpListener::bind((state.config.command_host.as_str(), state.config.command_port))
            .await
        {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "failed to bind command listener");
                return std::process::ExitCode::FAILURE;
            }
        };
    let heartbeat_listener = match TcpListener::bind((
        state.config.heartbeat_host.as_str(),
        state.config.heartbeat_port,
    ))
    .await
    {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "failed to bind heartbeat listener");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(
        command = %format!("{}:{}", state.config.command_host, state.config.command_port),
        heartbeat = %format!("{}:{}", state.config.heartbeat_host, state.config.heartbeat_port),
        workers = state.config.worker_count,
        "name server starting"
    );

    let queue = Arc::new(TaskQueue::new(state.config.task_queue_capacity));
    tokio::spawn(acceptor::run_acceptor(state.clone(), command_listener, queue.clone()));
    for _ in 0..state.config.worker_count.max(1) {
        tokio::spawn(acceptor::run_worker(state.clone(), queue.clone()));
    }
    tokio::spawn(heartbeat::run_heartbeat_listener(state.clone(), heartbeat_listener));
    tokio::spawn(heartbeat::run_failure_monitor(state.clone()));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");

    state.trigger_shutdown();
    notify_storage_servers(&state).await;
    // Give in-flight connection tasks a moment to notice the broadcast and
    // send SHUTDOWN before this process exits (spec §5).
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    state.directory.persist().await;
    info!("directory snapshot persisted, exiting");
    std::process::ExitCode::SUCCESS
}

/// Sends `SHUTDOWN` to every active SS's client port (spec §5: "sends
/// SHUTDOWN to every active SS and every active client session"); SS
/// shutdown is best-effort, matching the client-side notification in
/// `dispatch.rs`.
async fn notify_storage_servers(state: &std::sync::Arc<NsState>) {
    for ss_id in state.registry.active_ids() {
        let Some(info) = state.registry.get(&ss_id) else { continue };
        match TcpStream::connect((info.ip.as_str(), info.client_port)).await {
            Ok(mut stream) => {
                let (read_half, mut write_half) = stream.split();
                if write_line(&mut write_half, "SHUTDOWN").await.is_ok() {
                    let mut reader = BufReader::new(read_half);
                    let _ = read_request(&mut reader).await;
                }
            }
            Err(e) => warn!(%ss_id, error = %e, "could not reach storage server for shutdown"),
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
