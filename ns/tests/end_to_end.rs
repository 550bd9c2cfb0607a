//! Full-stack scenarios (spec §8): a real Name Server and a real Storage
//! Server, each bound to an ephemeral port, driven over actual TCP
//! connections the way a client would. `ns/src/dispatch.rs`'s verb table is
//! private, so there is no shortcut here — every command below is a line on
//! the wire.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use docstore_common::config::{NsConfig, SsConfig};
use docstore_ns::state::NsState;
use docstore_ss::state::SsState;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    ReadHalf, WriteHalf,
};
use tokio::net::{TcpListener, TcpStream};

/// NS verbs whose reply is a counted multi-line payload that a naive
/// single-`read_line` caller would otherwise leave stranded on the wire.
const PAYLOAD_VERBS: &[&str] = &["VIEW", "VIEWTRASH", "VIEWFOLDER", "LIST", "LISTREQ"];

async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) {
    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    writer.flush().await.unwrap();
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    line.trim_end_matches(['\n', '\r']).to_string()
}

/// Reads one reply header, draining and discarding any counted payload
/// lines that follow it so the connection stays aligned for the next
/// command.
async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> String {
    let header = read_line(reader).await;
    let mut tokens = header.split_whitespace();
    if let Some(verb) = tokens.next().and_then(|t| t.strip_prefix("ACK_")) {
        if PAYLOAD_VERBS.contains(&verb) {
            if let Some(count) = tokens.next().and_then(|t| t.parse::<usize>().ok()) {
                for _ in 0..count {
                    let mut discard = String::new();
                    reader.read_line(&mut discard).await.unwrap();
                }
            }
        }
    }
    header
}

async fn read_to_eof<R: AsyncRead + Unpin>(reader: &mut R) -> Vec<u8> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    buf
}

async fn bind_ephemeral() -> (TcpListener, u16) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn start_ns(data_dir: &Path) -> Arc<NsState> {
    let (command_listener, command_port) = bind_ephemeral().await;
    let (heartbeat_listener, heartbeat_port) = bind_ephemeral().await;

    let config = NsConfig {
        command_host: "127.0.0.1".to_string(),
        command_port,
        heartbeat_host: "127.0.0.1".to_string(),
        heartbeat_port,
        data_dir: data_dir.to_path_buf(),
        constants: docstore_common::config::Constants { replication_factor: 1, ..Default::default() },
        ..Default::default()
    };
    let state = NsState::new(config);
    let queue = Arc::new(docstore_ns::acceptor::TaskQueue::new(64));

    tokio::spawn(docstore_ns::acceptor::run_acceptor(state.clone(), command_listener, queue.clone()));
    for _ in 0..state.config.worker_count {
        tokio::spawn(docstore_ns::acceptor::run_worker(state.clone(), queue.clone()));
    }
    tokio::spawn(docstore_ns::heartbeat::run_heartbeat_listener(state.clone(), heartbeat_listener));
    tokio::spawn(docstore_ns::heartbeat::run_failure_monitor(state.clone()));
    state
}

async fn start_ss(ss_id: &str, ns_command_port: u16, ns_heartbeat_port: u16, data_dir: &Path) -> Arc<SsState> {
    let (client_listener, client_port) = bind_ephemeral().await;
    let (nm_listener, nm_port) = bind_ephemeral().await;

    let config = SsConfig {
        ss_id: ss_id.to_string(),
        client_host: "127.0.0.1".to_string(),
        client_port,
        nm_host: "127.0.0.1".to_string(),
        nm_port,
        ns_command_host: "127.0.0.1".to_string(),
        ns_command_port,
        ns_heartbeat_host: "127.0.0.1".to_string(),
        ns_heartbeat_port,
        data_dir: data_dir.to_path_buf(),
        stream_delay_millis: 0,
        ..Default::default()
    };
    let state = SsState::new(config);

    tokio::spawn(docstore_ss::client_listener::run_client_listener(state.clone(), client_listener));
    tokio::spawn(docstore_ss::nm_listener::run_nm_listener(state.clone(), nm_listener));
    tokio::spawn(docstore_ss::heartbeat::run_heartbeat_emitter(state.clone()));

    let reg_stream = TcpStream::connect(("127.0.0.1", ns_command_port)).await.unwrap();
    let (read_half, mut write_half) = tokio::io::split(reg_stream);
    send_line(&mut write_half, &format!("REG_SS {ss_id} {client_port} {nm_port}")).await;
    let reply = read_line(&mut BufReader::new(read_half)).await;
    assert_eq!(reply, "ACK_REG");

    // Give the registry a moment before any test issues a CREATE.
    tokio::time::sleep(Duration::from_millis(20)).await;
    state
}

/// One client's Name Server leg: a persistent connection that survives
/// across many commands, exactly like the interactive client.
struct ClientLeg {
    reader: BufReader<ReadHalf<TcpStream>>,
    writer: WriteHalf<TcpStream>,
}

impl ClientLeg {
    async fn connect(ns_command_port: u16, username: &str) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", ns_command_port)).await.unwrap();
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);
        send_line(&mut writer, &format!("REG_CLIENT {username}")).await;
        assert_eq!(read_reply(&mut reader).await, "ACK_REG");
        Self { reader, writer }
    }

    async fn command(&mut self, line: &str) -> String {
        send_line(&mut self.writer, line).await;
        read_reply(&mut self.reader).await
    }
}

/// A single redirected (SS-side) connection: one verb, replayed exactly as
/// the Name Server told the client.
struct SsLeg {
    reader: BufReader<ReadHalf<TcpStream>>,
    writer: WriteHalf<TcpStream>,
}

impl SsLeg {
    async fn connect(ip: &str, port: u16, line: &str) -> Self {
        let stream = TcpStream::connect((ip, port)).await.unwrap();
        let (read_half, mut writer) = tokio::io::split(stream);
        let reader = BufReader::new(read_half);
        send_line(&mut writer, line).await;
        Self { reader, writer }
    }

    async fn send(&mut self, line: &str) {
        send_line(&mut self.writer, line).await;
    }

    async fn recv(&mut self) -> String {
        read_line(&mut self.reader).await
    }

    async fn recv_to_eof(self) -> Vec<u8> {
        let mut reader = self.reader;
        read_to_eof(&mut reader).await
    }
}

fn parse_redirect(header: &str) -> (String, u16) {
    let mut tokens = header.split_whitespace();
    assert!(tokens.next().unwrap().starts_with("ACK_"));
    let ip = tokens.next().unwrap().to_string();
    let port = tokens.next().unwrap().parse().unwrap();
    (ip, port)
}

#[tokio::test]
async fn create_write_read_delete_round_trip() {
    let ns_dir = tempfile::tempdir().unwrap();
    let ss_dir = tempfile::tempdir().unwrap();

    let ns = start_ns(ns_dir.path()).await;
    start_ss("ss1", ns.config.command_port, ns.config.heartbeat_port, ss_dir.path()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut alice = ClientLeg::connect(ns.config.command_port, "alice").await;

    assert_eq!(alice.command("CREATE report.txt").await, "ACK_CREATE");

    let redirect = alice.command("WRITE report.txt 1").await;
    let (ip, port) = parse_redirect(&redirect);
    let mut edit = SsLeg::connect(&ip, port, "WRITE report.txt 1").await;
    assert_eq!(edit.recv().await, "ACK_WRITE_LOCKED");
    edit.send("1 Hello").await;
    assert_eq!(edit.recv().await, "ACK_WORD_EDIT");
    edit.send("2 world.").await;
    assert_eq!(edit.recv().await, "ACK_WORD_EDIT");
    edit.send("ETIRW").await;
    assert_eq!(edit.recv().await, "ACK_WRITE_SUCCESS");

    let redirect = alice.command("READ report.txt").await;
    let (ip, port) = parse_redirect(&redirect);
    let read_leg = SsLeg::connect(&ip, port, "READ report.txt").await;
    let bytes = read_leg.recv_to_eof().await;
    assert_eq!(String::from_utf8(bytes).unwrap(), "Hello world.");

    assert_eq!(alice.command("DELETE report.txt").await, "ACK_DELETE");
    assert_eq!(alice.command("READ report.txt").await, "ERR_FILE_NOT_FOUND");
}

#[tokio::test]
async fn trash_restore_and_view_trash() {
    let ns_dir = tempfile::tempdir().unwrap();
    let ss_dir = tempfile::tempdir().unwrap();
    let ns = start_ns(ns_dir.path()).await;
    start_ss("ss1", ns.config.command_port, ns.config.heartbeat_port, ss_dir.path()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut bob = ClientLeg::connect(ns.config.command_port, "bob").await;
    assert_eq!(bob.command("CREATE draft.txt").await, "ACK_CREATE");
    assert_eq!(bob.command("TRASH draft.txt").await, "ACK_TRASHED");
    assert_eq!(bob.command("VIEWTRASH").await, "ACK_VIEWTRASH 1");
    assert_eq!(bob.command("RESTORE draft.txt").await, "ACK_RESTORED");
    assert_eq!(bob.command("VIEWTRASH").await, "ACK_VIEWTRASH 0");
}

#[tokio::test]
async fn acl_grant_then_revoke_gates_write_access() {
    let ns_dir = tempfile::tempdir().unwrap();
    let ss_dir = tempfile::tempdir().unwrap();
    let ns = start_ns(ns_dir.path()).await;
    start_ss("ss1", ns.config.command_port, ns.config.heartbeat_port, ss_dir.path()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut owner = ClientLeg::connect(ns.config.command_port, "owner").await;
    let mut carol = ClientLeg::connect(ns.config.command_port, "carol").await;

    assert_eq!(owner.command("CREATE shared.txt").await, "ACK_CREATE");
    assert_eq!(carol.command("WRITE shared.txt 1").await, "ERR_WRITE_PERMISSION_DENIED");

    assert_eq!(owner.command("ADDACCESS -W shared.txt carol").await, "ACK_ADDACCESS");
    let redirect = carol.command("WRITE shared.txt 1").await;
    assert!(redirect.starts_with("ACK_WRITE "));

    assert_eq!(owner.command("REMACCESS shared.txt carol").await, "ACK_REMACCESS");
    assert_eq!(carol.command("WRITE shared.txt 1").await, "ERR_WRITE_PERMISSION_DENIED");
}

#[tokio::test]
async fn concurrent_write_on_same_sentence_is_rejected() {
    let ns_dir = tempfile::tempdir().unwrap();
    let ss_dir = tempfile::tempdir().unwrap();
    let ns = start_ns(ns_dir.path()).await;
    start_ss("ss1", ns.config.command_port, ns.config.heartbeat_port, ss_dir.path()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut dave = ClientLeg::connect(ns.config.command_port, "dave").await;
    assert_eq!(dave.command("CREATE notes.txt").await, "ACK_CREATE");

    let redirect = dave.command("WRITE notes.txt 1").await;
    let (ip, port) = parse_redirect(&redirect);
    let mut first = SsLeg::connect(&ip, port, "WRITE notes.txt 1").await;
    assert_eq!(first.recv().await, "ACK_WRITE_LOCKED");

    // The Name Server still hands out a redirect for the second WRITE (it
    // doesn't track sentence locks); the Storage Server itself refuses the
    // second lock attempt.
    let redirect2 = dave.command("WRITE notes.txt 1").await;
    let (ip2, port2) = parse_redirect(&redirect2);
    let mut second = SsLeg::connect(&ip2, port2, "WRITE notes.txt 1").await;
    assert_eq!(second.recv().await, "ERR_FILE_LOCKED");

    first.send("ETIRW").await;
    assert_eq!(first.recv().await, "ACK_WRITE_SUCCESS");
}

#[tokio::test]
async fn checkpoint_and_revert_restore_prior_content() {
    let ns_dir = tempfile::tempdir().unwrap();
    let ss_dir = tempfile::tempdir().unwrap();
    let ns = start_ns(ns_dir.path()).await;
    start_ss("ss1", ns.config.command_port, ns.config.heartbeat_port, ss_dir.path()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut erin = ClientLeg::connect(ns.config.command_port, "erin").await;
    assert_eq!(erin.command("CREATE log.txt").await, "ACK_CREATE");

    let redirect = erin.command("WRITE log.txt 1").await;
    let (ip, port) = parse_redirect(&redirect);
    let mut edit = SsLeg::connect(&ip, port, "WRITE log.txt 1").await;
    assert_eq!(edit.recv().await, "ACK_WRITE_LOCKED");
    edit.send("1 First.").await;
    assert_eq!(edit.recv().await, "ACK_WORD_EDIT");
    edit.send("ETIRW").await;
    assert_eq!(edit.recv().await, "ACK_WRITE_SUCCESS");

    let redirect = erin.command("CHECKPOINT log.txt v1").await;
    let (ip, port) = parse_redirect(&redirect);
    let mut checkpoint = SsLeg::connect(&ip, port, "CHECKPOINT log.txt v1").await;
    assert_eq!(checkpoint.recv().await, "ACK_CHECKPOINT");

    let redirect = erin.command("WRITE log.txt 1").await;
    let (ip, port) = parse_redirect(&redirect);
    let mut edit2 = SsLeg::connect(&ip, port, "WRITE log.txt 1").await;
    assert_eq!(edit2.recv().await, "ACK_WRITE_LOCKED");
    edit2.send("1 Second.").await;
    assert_eq!(edit2.recv().await, "ACK_WORD_EDIT");
    edit2.send("ETIRW").await;
    assert_eq!(edit2.recv().await, "ACK_WRITE_SUCCESS");

    let redirect = erin.command("REVERT log.txt v1").await;
    let (ip, port) = parse_redirect(&redirect);
    let mut revert = SsLeg::connect(&ip, port, "REVERT log.txt v1").await;
    assert_eq!(revert.recv().await, "ACK_REVERT");

    let redirect = erin.command("READ log.txt").await;
    let (ip, port) = parse_redirect(&redirect);
    let read_leg = SsLeg::connect(&ip, port, "READ log.txt").await;
    let bytes = read_leg.recv_to_eof().await;
    assert_eq!(String::from_utf8(bytes).unwrap(), "First.");
}

#[tokio::test]
async fn request_approve_grants_access() {
    let ns_dir = tempfile::tempdir().unwrap();
    let ss_dir = tempfile::tempdir().unwrap();
    let ns = start_ns(ns_dir.path()).await;
    start_ss("ss1", ns.config.command_port, ns.config.heartbeat_port, ss_dir.path()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut owner = ClientLeg::connect(ns.config.command_port, "frank").await;
    let mut grace = ClientLeg::connect(ns.config.command_port, "grace").await;

    assert_eq!(owner.command("CREATE budget.txt").await, "ACK_CREATE");
    let req_reply = grace.command("REQACCESS -W budget.txt").await;
    assert!(req_reply.starts_with("ACK_REQACCESS "));
    let req_id = req_reply.trim_start_matches("ACK_REQACCESS ").trim();

    let listing = owner.command("LISTREQ").await;
    assert!(listing.starts_with("ACK_LISTREQ "));

    assert_eq!(owner.command(&format!("APPROVE {req_id}")).await, "ACK_APPROVED");

    let redirect = grace.command("WRITE budget.txt 1").await;
    assert!(redirect.starts_with("ACK_WRITE "));
}

#[tokio::test]
async fn trash_and_delete_are_blocked_while_a_sentence_lock_is_held() {
    let ns_dir = tempfile::tempdir().unwrap();
    let ss_dir = tempfile::tempdir().unwrap();
    let ns = start_ns(ns_dir.path()).await;
    start_ss("ss1", ns.config.command_port, ns.config.heartbeat_port, ss_dir.path()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut henry = ClientLeg::connect(ns.config.command_port, "henry").await;
    assert_eq!(henry.command("CREATE minutes.txt").await, "ACK_CREATE");

    let redirect = henry.command("WRITE minutes.txt 1").await;
    let (ip, port) = parse_redirect(&redirect);
    let mut edit = SsLeg::connect(&ip, port, "WRITE minutes.txt 1").await;
    assert_eq!(edit.recv().await, "ACK_WRITE_LOCKED");

    // The Storage Server still holds the sentence lock, so the Name Server
    // must refuse both TRASH and DELETE rather than redirecting a deletion
    // past it.
    assert_eq!(henry.command("TRASH minutes.txt").await, "ERR_FILE_LOCKED");
    assert_eq!(henry.command("DELETE minutes.txt").await, "ERR_FILE_LOCKED");

    edit.send("ETIRW").await;
    assert_eq!(edit.recv().await, "ACK_WRITE_SUCCESS");

    assert_eq!(henry.command("TRASH minutes.txt").await, "ACK_TRASHED");
}
