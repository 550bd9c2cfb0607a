//! Acceptor + Worker Pool (spec §4.3). A single acceptor task reads the
//! first line off every new connection (enough to tell `REG_CLIENT` from
//! `REG_SS` from an SS's fire-and-forget `NM_FILE_MODIFIED` notification)
//! and enqueues a [`Task`]; a fixed pool of workers drains the queue and
//! then owns that connection for its entire lifetime.
//!
//! The bounded FIFO is a `crossbeam_queue::ArrayQueue`, matching the
//! source's fixed-capacity task queue; a `tokio::sync::Notify` doorbell
//! wakes a sleeping worker since the lock-free queue itself cannot park a
//! task.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use docstore_common::protocol::Request;
use docstore_common::wire::{read_request, write_reply};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::dispatch;
use crate::registry::RegisterOutcome as SsRegisterOutcome;
use crate::replication;
use crate::session::RegisterOutcome as ClientRegisterOutcome;
use crate::state::NsState;

pub struct Task {
    pub stream: TcpStream,
    pub first_request: Request,
}

pub struct TaskQueue {
    queue: ArrayQueue<Task>,
    doorbell: Notify,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self { queue: ArrayQueue::new(capacity), doorbell: Notify::new() }
    }

    fn push(&self, task: Task) {
        if self.queue.push(task).is_err() {
            warn!("task queue full, dropping a newly accepted connection");
        } else {
            self.doorbell.notify_one();
        }
    }

    async fn pop(&self) -> Task {
        loop {
            if let Some(task) = self.queue.pop() {
                return task;
            }
            self.doorbell.notified().await;
        }
    }
}

/// Runs forever, accepting connections and reading each one's first line.
pub async fn run_acceptor(state: Arc<NsState>, listener: TcpListener, queue: Arc<TaskQueue>) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };
        let queue = queue.clone();
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = admit(stream, &queue).await {
                warn!(%addr, %err, "dropping connection before registration");
            }
            let _ = &state;
        });
    }
}

async fn admit(mut stream: TcpStream, queue: &TaskQueue) -> std::io::Result<()> {
    let first_request = {
        let (read_half, _write_half) = stream.split();
        let mut reader = BufReader::new(read_half);
        match read_request(&mut reader).await? {
            Some(req) => req,
            None => return Ok(()),
        }
    };
    if !matches!(
        first_request_verb(&first_request),
        "REG_CLIENT" | "REG_SS" | "NM_FILE_MODIFIED"
    ) {
        let (_, mut writer) = stream.split();
        write_reply(
            &mut writer,
            &docstore_common::Reply::Err(docstore_common::ErrCode::UnknownCmd),
        )
        .await?;
        writer.shutdown().await?;
        return Ok(());
    }
    queue.push(Task { stream, first_request });
    Ok(())
}

fn first_request_verb(req: &Request) -> &str {
    &req.verb
}

/// A single worker: pop a task, register it, then service the connection
/// until EOF.
pub async fn run_worker(state: Arc<NsState>, queue: Arc<TaskQueue>) {
    loop {
        let task = queue.pop().await;
        if let Err(err) = service_task(&state, task).await {
            warn!(%err, "connection ended with an I/O error");
        }
    }
}

async fn service_task(state: &Arc<NsState>, task: Task) -> std::io::Result<()> {
    let Task { mut stream, first_request } = task;
    match first_request.verb.as_str() {
        "REG_CLIENT" => {
            let username = match first_request.args.first() {
                Some(u) => u.clone(),
                None => {
                    let (_, mut w) = stream.split();
                    write_reply(
                        &mut w,
                        &docstore_common::Reply::Err(docstore_common::ErrCode::NoFilename),
                    )
                    .await?;
                    return Ok(());
                }
            };
            let outcome = state.sessions.register(&username);
            let reply = match outcome {
                ClientRegisterOutcome::Registered => docstore_common::Reply::ack("REG"),
                ClientRegisterOutcome::UsernameInUse => {
                    docstore_common::Reply::Err(docstore_common::ErrCode::UsernameInUse)
                }
                ClientRegisterOutcome::MaxClients => {
                    docstore_common::Reply::Err(docstore_common::ErrCode::MaxClients)
                }
            };
            {
                let (_, mut writer) = stream.split();
                write_reply(&mut writer, &reply).await?;
            }
            if outcome != ClientRegisterOutcome::Registered {
                return Ok(());
            }
            info!(%username, "client registered");
            dispatch::serve_client_connection(state.clone(), stream, username).await
        }
        "REG_SS" => {
            let (ss_id, client_port, nm_port) = match parse_reg_ss(&first_request) {
                Some(parts) => parts,
                None => {
                    let (_, mut w) = stream.split();
                    write_reply(
                        &mut w,
                        &docstore_common::Reply::Err(docstore_common::ErrCode::InvalidArgs),
                    )
                    .await?;
                    return Ok(());
                }
            };
            let peer_ip = stream.peer_addr().map(|a| a.ip().to_string()).unwrap_or_default();
            let outcome = state.registry.register(&ss_id, &peer_ip, client_port, nm_port);
            let reply = match outcome {
                Some(SsRegisterOutcome::New) => docstore_common::Reply::ack("REG"),
                Some(SsRegisterOutcome::Recovery) => docstore_common::Reply::ack("REG_RECOVERY"),
                None => docstore_common::Reply::Err(docstore_common::ErrCode::MaxSs),
            };
            {
                let (_, mut writer) = stream.split();
                write_reply(&mut writer, &reply).await?;
            }
            if let Some(SsRegisterOutcome::Recovery) = outcome {
                info!(ss_id = %ss_id, "storage server recovering, spawning sync task");
                crate::recovery::spawn_recovery(state.clone(), ss_id);
            }
            Ok(())
        }
        "NM_FILE_MODIFIED" => {
            match parse_file_modified(&first_request.args) {
                Some((name, ss_id, size, words, chars, last_access)) => {
                    replication::handle_file_modified(
                        state.clone(),
                        name,
                        ss_id,
                        size,
                        words,
                        chars,
                        last_access,
                    )
                    .await;
                }
                None => warn!("malformed NM_FILE_MODIFIED notification"),
            }
            Ok(())
        }
        other => {
            warn!(verb = other, "unexpected first verb reached worker");
            Ok(())
        }
    }
}

fn parse_reg_ss(req: &Request) -> Option<(String, u16, u16)> {
    let ss_id = req.args.first()?.clone();
    let client_port: u16 = req.args.get(1)?.parse().ok()?;
    let nm_port: u16 = req.args.get(2)?.parse().ok()?;
    Some((ss_id, client_port, nm_port))
}

fn parse_file_modified(args: &[String]) -> Option<(String, String, u64, u64, u64, i64)> {
    if args.len() < 6 {
        return None;
    }
    let name = args[0].clone();
    let ss_id = args[1].clone();
    let size = args[2].parse().ok()?;
    let words = args[3].parse().ok()?;
    let chars = args[4].parse().ok()?;
    let last_access = args[5].parse().ok()?;
    Some((name, ss_id, size, words, chars, last_access))
}
