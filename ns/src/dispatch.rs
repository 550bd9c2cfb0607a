//! Name Server Command Dispatcher (spec §4.4): the per-verb table driving
//! every client connection once `REG_CLIENT` has succeeded.

use std::io::Write as _;
use std::sync::Arc;

use docstore_common::error::ErrCode;
use docstore_common::protocol::{Reply, Request};
use docstore_common::wire::{read_request, read_to_eof, write_line, write_reply};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::registry::SsInfo;
use crate::replication;
use crate::requests::{RequestError, RequestKind};
use crate::session;
use crate::state::NsState;
use crate::trie::{DirectoryError, FileEntry, Perm};

/// Services one registered client connection until EOF or a shutdown
/// broadcast (spec §5 Shutdown, §4.3 "worker services the same connection
/// for its entire session lifetime").
pub async fn serve_client_connection(
    state: Arc<NsState>,
    mut stream: TcpStream,
    username: String,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);
    let mut shutdown_rx = state.subscribe_shutdown();
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                let _ = write_line(&mut write_half, "SHUTDOWN").await;
                break;
            }
            next = read_request(&mut reader) => {
                match next? {
                    None => break,
                    Some(request) => {
                        let reply = handle_command(&state, &username, &request).await;
                        write_reply(&mut write_half, &reply).await?;
                    }
                }
            }
        }
    }
    state.sessions.disconnect(&username);
    info!(%username, "client disconnected");
    Ok(())
}

async fn handle_command(state: &Arc<NsState>, username: &str, request: &Request) -> Reply {
    let result = match request.verb.as_str() {
        "CREATE" => create(state, username, request, false).await,
        "CREATEFOLDER" => create(state, username, request, true).await,
        "TRASH" => mark_trash(state, username, request, true).await,
        "RESTORE" => mark_trash(state, username, request, false).await,
        "VIEWTRASH" => view_trash(state, username),
        "EMPTYTRASH" => empty_trash(state, username).await,
        "DELETE" => delete(state, username, request).await,
        "READ" | "STREAM" | "UNDO" | "CHECKPOINT" | "REVERT" | "VIEWCHECKPOINT"
        | "LISTCHECKPOINTS" | "WRITE" => redirect(state, username, request),
        "VIEW" => view(state, username, request).await,
        "INFO" => info_cmd(state, username, request).await,
        "LIST" => Ok(list_sessions(state)),
        "ADDACCESS" => add_access(state, username, request).await,
        "REMACCESS" => rem_access(state, username, request).await,
        "MOVE" => mov(state, username, request).await,
        "VIEWFOLDER" => view_folder(state, username, request),
        "REQACCESS" => req_access(state, username, request),
        "LISTREQ" => Ok(list_req(state, username)),
        "APPROVE" => approve_deny(state, username, request, true).await,
        "DENY" => approve_deny(state, username, request, false).await,
        "EXEC" => exec(state, username, request).await,
        _ => Err(ErrCode::UnknownCmd),
    };
    match result {
        Ok(reply) => reply,
        Err(code) => Reply::Err(code),
    }
}

fn filename_arg(request: &Request) -> Result<&str, ErrCode> {
    request.arg(0).ok_or(ErrCode::NoFilename)
}

fn dir_err(e: DirectoryError) -> ErrCode {
    match e {
        DirectoryError::NotFound => ErrCode::FileNotFound,
        DirectoryError::Exists { is_folder: true } => ErrCode::FolderExists,
        DirectoryError::Exists { is_folder: false } => ErrCode::FileExists,
        DirectoryError::IsFolder => ErrCode::CannotDeleteFolder,
        DirectoryError::InTrash => ErrCode::FileInTrash,
        DirectoryError::NotInTrash => ErrCode::NotInTrash,
        DirectoryError::AlreadyInTrash => ErrCode::AlreadyInTrash,
        DirectoryError::NotOwner => ErrCode::PermissionDenied,
        DirectoryError::AlreadyHasAccess => ErrCode::AlreadyHasAccess,
        DirectoryError::AlreadyOwner => ErrCode::AlreadyOwner,
        DirectoryError::AclFull => ErrCode::AclFull,
        DirectoryError::UserNotInAcl => ErrCode::UserNotInAcl,
    }
}

async fn create(
    state: &Arc<NsState>,
    username: &str,
    request: &Request,
    is_folder: bool,
) -> Result<Reply, ErrCode> {
    let name = filename_arg(request)?;
    if state.directory.find_any(name).is_some() {
        return Err(ErrCode::FileExists);
    }
    let replicas = state
        .registry
        .select_replicas(state.config.constants.replication_factor)
        .ok_or(ErrCode::NoSsAvail)?;
    let primary = state.registry.get(&replicas[0]).ok_or(ErrCode::NoSsAvail)?;
    let verb = if is_folder { "NM_CREATEFOLDER" } else { "NM_CREATE" };
    let reply = state
        .ss_link
        .send_command(&primary.ip, primary.nm_port, verb, &[name])
        .await
        .map_err(|e| {
            warn!(error = %e, ss = %primary.id, "primary unreachable for create");
            if is_folder { ErrCode::SsCreatefolderFailed } else { ErrCode::SsCreateFailed }
        })?;
    if let Reply::Err(code) = reply {
        return Err(code);
    }
    if is_folder {
        state.directory.insert_folder(name, username.to_string(), replicas.clone())
    } else {
        state.directory.insert_file(name, username.to_string(), replicas.clone())
    }
    .map_err(dir_err)?;
    state.cache.invalidate(name);
    state.directory.persist().await;
    replication::spawn_create_fanout(state.clone(), name.to_string(), replicas, verb.to_string());
    Ok(Reply::ack(if is_folder { "CREATEFOLDER" } else { "CREATE" }))
}

async fn replicas_locked(state: &Arc<NsState>, entry: &FileEntry, name: &str) -> bool {
    for ss_id in &entry.replicas {
        let Some(info) = state.registry.get(ss_id) else { continue };
        if !info.is_active {
            continue;
        }
        match state.ss_link.send_command(&info.ip, info.nm_port, "NM_CHECK_LOCKS", &[name]).await {
            Ok(Reply::Ack(verb)) if verb == "FILE_LOCKED" => return true,
            _ => {}
        }
    }
    false
}

async fn mark_trash(
    state: &Arc<NsState>,
    username: &str,
    request: &Request,
    flag: bool,
) -> Result<Reply, ErrCode> {
    let name = filename_arg(request)?;
    if flag {
        let entry = state.directory.find(name, false).ok_or(ErrCode::FileNotFound)?;
        if replicas_locked(state, &entry, name).await {
            return Err(ErrCode::FileLocked);
        }
    }
    state.directory.mark_trash(name, flag, username).map_err(dir_err)?;
    state.cache.invalidate(name);
    state.directory.persist().await;
    Ok(Reply::ack(if flag { "TRASHED" } else { "RESTORED" }))
}

fn view_trash(state: &Arc<NsState>, username: &str) -> Result<Reply, ErrCode> {
    let names = state.directory.list_trash(username).into_iter().map(|(n, _)| n).collect();
    Ok(Reply::payload("VIEWTRASH", names))
}

async fn empty_trash(state: &Arc<NsState>, username: &str) -> Result<Reply, ErrCode> {
    let trashed = state.directory.list_trash(username);
    let mut count = 0u32;
    for (name, entry) in trashed {
        delete_from_replicas(state, &entry, &name).await;
        if state.directory.delete(&name).is_ok() {
            state.cache.invalidate(&name);
            count += 1;
        }
    }
    state.directory.persist().await;
    Ok(Reply::AckArgs("EMPTYTRASH".to_string(), vec![count.to_string()]))
}

async fn delete_from_replicas(state: &Arc<NsState>, entry: &FileEntry, name: &str) {
    for ss_id in &entry.replicas {
        if let Some(info) = state.registry.get(ss_id) {
            if !info.is_active {
                continue;
            }
            if let Err(e) =
                state.ss_link.send_command(&info.ip, info.nm_port, "NM_DELETE", &[name]).await
            {
                warn!(error = %e, ss = %ss_id, %name, "delete failed on replica");
            }
        }
    }
}

async fn delete(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let name = filename_arg(request)?;
    let entry = state.directory.find(name, false).ok_or(ErrCode::FileNotFound)?;
    if entry.is_folder {
        return Err(ErrCode::CannotDeleteFolder);
    }
    if entry.owner != username {
        return Err(ErrCode::PermissionDenied);
    }
    if replicas_locked(state, &entry, name).await {
        return Err(ErrCode::FileLocked);
    }
    delete_from_replicas(state, &entry, name).await;
    state.directory.delete(name).map_err(dir_err)?;
    state.cache.invalidate(name);
    state.directory.persist().await;
    Ok(Reply::ack("DELETE"))
}

/// READ/STREAM/WRITE/UNDO/CHECKPOINT/REVERT/VIEWCHECKPOINT/LISTCHECKPOINTS
/// (spec §4.4 redirect row): resolve permission then redirect to an active
/// replica, preferring the cached one.
fn redirect(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let name = filename_arg(request)?;
    let entry = state.directory.find(name, false).ok_or(ErrCode::FileNotFound)?;
    let required = if request.verb == "WRITE" { Perm::Write } else { Perm::Read };
    if entry.permission(username) < required {
        return Err(if required == Perm::Write {
            ErrCode::WritePermissionDenied
        } else {
            ErrCode::ReadPermissionDenied
        });
    }
    let chosen = choose_active_replica(state, name, &entry).ok_or(ErrCode::NoSsAvail)?;
    let info = state.registry.get(&chosen).ok_or(ErrCode::NoSsAvail)?;
    state.cache.put(name, &chosen);
    Ok(Reply::redirect(request.verb.clone(), info.ip, info.client_port))
}

fn choose_active_replica(state: &Arc<NsState>, name: &str, entry: &FileEntry) -> Option<String> {
    if let Some(cached) = state.cache.get(name) {
        if state.registry.is_active(&cached) {
            return Some(cached);
        }
        state.cache.invalidate(name);
    }
    entry.replicas.iter().find(|id| state.registry.is_active(id)).cloned()
}

async fn view(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let include_all = request.args.iter().any(|a| a == "-a");
    let long = request.args.iter().any(|a| a == "-l");
    let entries = state.directory.list(username, include_all);
    let mut lines = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        if !long {
            lines.push(name);
            continue;
        }
        let stats = probe_stats(state, &entry, &name).await;
        lines.push(format!(
            "{name} {} {} {} {}",
            entry.owner, stats.0, stats.1, stats.2
        ));
    }
    Ok(Reply::payload("VIEW", lines))
}

/// Best-effort live `(size, words, chars)` probe of the primary SS (spec §9:
/// "VIEW -l ... can return stale or inconsistent stats" is acceptable).
async fn probe_stats(state: &Arc<NsState>, entry: &FileEntry, name: &str) -> (u64, u64, u64) {
    let Some(primary_id) = entry.primary() else { return (entry.size, entry.word_count, entry.char_count) };
    let Some(info) = state.registry.get(primary_id) else {
        return (entry.size, entry.word_count, entry.char_count);
    };
    if !info.is_active {
        return (entry.size, entry.word_count, entry.char_count);
    }
    match state.ss_link.send_command(&info.ip, info.nm_port, "NM_GETSTATS", &[name]).await {
        Ok(Reply::AckArgs(_, args)) if args.len() >= 3 => {
            let parse = |i: usize| args.get(i).and_then(|s| s.parse().ok()).unwrap_or(0);
            (parse(0), parse(1), parse(2))
        }
        _ => (entry.size, entry.word_count, entry.char_count),
    }
}

async fn info_cmd(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let name = filename_arg(request)?;
    let entry = state.directory.find(name, false).ok_or(ErrCode::FileNotFound)?;
    if entry.permission(username) < Perm::Read {
        return Err(ErrCode::ReadPermissionDenied);
    }
    let live_size = probe_size(state, &entry, name).await.unwrap_or(entry.size);
    let reads: Vec<&str> = entry.read_users.iter().map(String::as_str).collect();
    let writes: Vec<&str> = entry.write_users.iter().map(String::as_str).collect();
    let lines = vec![
        format!("filename {name}"),
        format!("owner {}", entry.owner),
        format!("size {live_size}"),
        format!("creation_time {}", entry.creation_time),
        format!("read_users {}", reads.join(",")),
        format!("write_users {}", writes.join(",")),
    ];
    Ok(Reply::payload("INFO", lines))
}

async fn probe_size(state: &Arc<NsState>, entry: &FileEntry, name: &str) -> Option<u64> {
    let primary_id = entry.primary()?;
    let info = state.registry.get(primary_id)?;
    if !info.is_active {
        return None;
    }
    match state.ss_link.send_command(&info.ip, info.nm_port, "NM_GETSIZE", &[name]).await {
        Ok(Reply::AckArgs(_, args)) => args.first()?.parse().ok(),
        _ => None,
    }
}

fn list_sessions(state: &Arc<NsState>) -> Reply {
    let lines = state
        .sessions
        .list()
        .into_iter()
        .map(|s: session::Session| {
            format!("{} {}", s.username, if s.is_active { "ACTIVE" } else { "INACTIVE" })
        })
        .collect();
    Reply::payload("LIST", lines)
}

async fn add_access(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let flag = request.arg(0).ok_or(ErrCode::InvalidArgs)?;
    let name = request.arg(1).ok_or(ErrCode::NoFilename)?;
    let target = request.arg(2).ok_or(ErrCode::InvalidArgs)?;
    let write = match flag {
        "-W" => true,
        "-R" => false,
        _ => return Err(ErrCode::InvalidFlag),
    };
    state
        .directory
        .add_acl(name, username, write, target, state.config.constants.max_users)
        .map_err(dir_err)?;
    state.directory.persist().await;
    Ok(Reply::ack("ADDACCESS"))
}

async fn rem_access(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let name = request.arg(0).ok_or(ErrCode::NoFilename)?;
    let target = request.arg(1).ok_or(ErrCode::InvalidArgs)?;
    state.directory.remove_acl(name, username, target).map_err(dir_err)?;
    state.directory.persist().await;
    Ok(Reply::ack("REMACCESS"))
}

async fn mov(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let src = request.arg(0).ok_or(ErrCode::NoFilename)?;
    let dest = request.arg(1).ok_or(ErrCode::InvalidArgs)?;
    let entry = state.directory.find(src, false).ok_or(ErrCode::FileNotFound)?;
    if entry.permission(username) < Perm::Write {
        return Err(ErrCode::WritePermissionDenied);
    }
    let new_name = state.directory.move_entry(src, dest, username).map_err(|e| match e {
        DirectoryError::NotOwner => ErrCode::WritePermissionDenied,
        other => dir_err(other),
    })?;
    for ss_id in &entry.replicas {
        if let Some(info) = state.registry.get(ss_id) {
            if !info.is_active {
                continue;
            }
            if let Err(e) =
                state.ss_link.send_command(&info.ip, info.nm_port, "NM_MOVE", &[src, dest]).await
            {
                warn!(error = %e, ss = %ss_id, "move failed on replica");
            }
        }
    }
    state.cache.invalidate(src);
    state.directory.persist().await;
    Ok(Reply::AckArgs("MOVE".to_string(), vec![new_name]))
}

fn view_folder(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let name = filename_arg(request)?;
    let children = state.directory.list_folder(name, username).map_err(|e| match e {
        DirectoryError::NotOwner => ErrCode::ReadPermissionDenied,
        other => dir_err(other),
    })?;
    let lines = children.into_iter().map(|(n, _)| n).collect();
    Ok(Reply::payload("VIEWFOLDER", lines))
}

fn req_access(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let flag = request.arg(0).ok_or(ErrCode::InvalidArgs)?;
    let name = request.arg(1).ok_or(ErrCode::NoFilename)?;
    let kind = match flag {
        "-W" => RequestKind::Write,
        "-R" => RequestKind::Read,
        _ => return Err(ErrCode::InvalidFlag),
    };
    let entry = state.directory.find(name, false).ok_or(ErrCode::FileNotFound)?;
    if entry.owner == username {
        return Err(ErrCode::AlreadyOwner);
    }
    let have = entry.permission(username);
    let sufficient = match kind {
        RequestKind::Read => have >= Perm::Read,
        RequestKind::Write => have >= Perm::Write,
    };
    if sufficient {
        return Err(ErrCode::AlreadyHasAccess);
    }
    let id = state.requests.create(name, username, &entry.owner, kind);
    Ok(Reply::AckArgs("REQACCESS".to_string(), vec![id.to_string()]))
}

fn list_req(state: &Arc<NsState>, username: &str) -> Reply {
    let lines = state
        .requests
        .list_for(username)
        .into_iter()
        .map(|r| {
            format!(
                "{} {} {} {} {} {}",
                r.id,
                r.filename,
                r.requester,
                r.owner,
                r.kind.as_str(),
                r.status.as_str()
            )
        })
        .collect();
    Reply::payload("LISTREQ", lines)
}

async fn approve_deny(
    state: &Arc<NsState>,
    username: &str,
    request: &Request,
    approve: bool,
) -> Result<Reply, ErrCode> {
    let id: u64 = request.arg(0).ok_or(ErrCode::InvalidId)?.parse().map_err(|_| ErrCode::InvalidId)?;
    let outcome = if approve { state.requests.approve(id, username) } else { state.requests.deny(id, username) };
    let record = outcome.map_err(|e| match e {
        RequestError::NotFound => ErrCode::ReqNotFound,
        RequestError::NotPending => ErrCode::ReqNotPending,
        RequestError::NotRequestOwner => ErrCode::NotRequestOwner,
    })?;
    if approve {
        let write = record.kind == RequestKind::Write;
        if let Err(e) =
            state.directory.add_acl(&record.filename, username, write, &record.requester, state.config.constants.max_users)
        {
            warn!(error = %e, "approved request could not be applied to the ACL");
        }
        state.directory.persist().await;
    }
    Ok(Reply::ack(if approve { "APPROVED" } else { "DENIED" }))
}

async fn exec(state: &Arc<NsState>, username: &str, request: &Request) -> Result<Reply, ErrCode> {
    let name = filename_arg(request)?;
    let entry = state.directory.find(name, false).ok_or(ErrCode::FileNotFound)?;
    if entry.permission(username) < Perm::Read {
        return Err(ErrCode::ReadPermissionDenied);
    }
    let primary_id = entry.primary().ok_or(ErrCode::NoSsAvail)?;
    let info = state.registry.get(primary_id).filter(|i| i.is_active).ok_or(ErrCode::SsUnreachable)?;
    let bytes = fetch_file_bytes(&info, name, state.config.constants.buffer_size)
        .await
        .map_err(|e| {
            warn!(error = %e, "EXEC could not fetch file content");
            ErrCode::SsUnreachable
        })?;
    run_temp_executable(&bytes).await
}

/// Opens a client-facing connection to `info` and replays `READ name`,
/// reading the full byte stream until the SS closes (spec §4.7).
async fn fetch_file_bytes(info: &SsInfo, name: &str, buffer_size: usize) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect((info.ip.as_str(), info.client_port)).await?;
    {
        let (_, mut writer) = stream.split();
        write_line(&mut writer, &format!("READ {name}")).await?;
    }
    let (mut reader, _) = stream.split();
    read_to_eof(&mut reader, buffer_size.max(1) * 1024).await
}

async fn run_temp_executable(bytes: &[u8]) -> Result<Reply, ErrCode> {
    let mut file = tempfile::NamedTempFile::new().map_err(|_| ErrCode::SsUnreachable)?;
    file.write_all(bytes).map_err(|_| ErrCode::SsUnreachable)?;
    file.flush().map_err(|_| ErrCode::SsUnreachable)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.as_file().metadata().map_err(|_| ErrCode::SsUnreachable)?.permissions();
        perms.set_mode(0o700);
        file.as_file().set_permissions(perms).map_err(|_| ErrCode::SsUnreachable)?;
    }
    let path = file.path().to_path_buf();
    let output = tokio::process::Command::new(&path)
        .output()
        .await
        .map_err(|_| ErrCode::SsUnreachable)?;
    let mut combined = Vec::new();
    combined.extend_from_slice(&output.stdout);
    combined.extend_from_slice(&output.stderr);
    let text = String::from_utf8_lossy(&combined);
    let lines = text.lines().map(str::to_string).collect();
    Ok(Reply::payload("EXEC", lines))
}
