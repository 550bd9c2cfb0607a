//! Storage Server binary: registers with the Name Server, then runs the
//! client-facing and NM-facing listeners plus the heartbeat emitter
//! (spec §2, §5).

use std::path::PathBuf;

use clap::Parser;
use docstore_common::config::SsConfig;
use docstore_common::wire::{read_request, write_line};
use docstore_ss::state::SsState;
use docstore_ss::{client_listener, heartbeat, nm_listener};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ss")]
#[command(about = "Storage Server: sentence-locked file bytes for one replica slot")]
struct Args {
    /// Path to a TOML config file; missing file falls back to defaults.
    #[arg(short, long, default_value = "ss.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = SsConfig::load(&args.config);
    let state = SsState::new(config);

    let client_listener_sock =
        match TcpListener::bind((state.config.client_host.as_str(), state.config.client_port)).await {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "failed to bind client listener");
                return std::process::ExitCode::FAILURE;
            }
        };
    let nm_listener_sock =
        match TcpListener::bind((state.config.nm_host.as_str(), state.config.nm_port)).await {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "failed to bind NM listener");
                return std::process::ExitCode::FAILURE;
            }
        };

    if let Err(e) = register_with_name_server(&state).await {
        error!(error = %e, "could not register with name server");
        return std::process::ExitCode::FAILURE;
    }

    info!(
        ss_id = %state.config.ss_id,
        client = %format!("{}:{}", state.config.client_host, state.config.client_port),
        nm = %format!("{}:{}", state.config.nm_host, state.config.nm_port),
        "storage server starting"
    );

    tokio::spawn(client_listener::run_client_listener(state.clone(), client_listener_sock));
    tokio::spawn(nm_listener::run_nm_listener(state.clone(), nm_listener_sock));
    tokio::spawn(heartbeat::run_heartbeat_emitter(state.clone()));

    wait_for_shutdown_signal(&state).await;
    info!("shutting down");
    std::process::ExitCode::SUCCESS
}

async fn register_with_name_server(state: &std::sync::Arc<SsState>) -> std::io::Result<()> {
    let mut stream =
        TcpStream::connect((state.config.ns_command_host.as_str(), state.config.ns_command_port)).await?;
    let line = format!(
        "REG_SS {} {} {}",
        state.config.ss_id, state.config.client_port, state.config.nm_port
    );
    {
        let (_, mut write_half) = stream.split();
        write_line(&mut write_half, &line).await?;
    }
    let mut reader = BufReader::new(stream);
    match read_request(&mut reader).await? {
        Some(reply) if reply.verb == "ACK_REG" => {
            info!("registered with name server as a new replica");
            Ok(())
        }
        Some(reply) if reply.verb == "ACK_REG_RECOVERY" => {
            info!("registered with name server, recovery sync will follow");
            Ok(())
        }
        Some(reply) => Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("name server rejected registration: {}", reply.verb),
        )),
        None => Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "name server closed connection")),
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal(state: &std::sync::Arc<SsState>) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut shutdown_rx = state.subscribe_shutdown();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
        _ = shutdown_rx.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal(state: &std::sync::Arc<SsState>) {
    let mut shutdown_rx = state.subscribe_shutdown();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = shutdown_rx.recv() => {}
    }
}
