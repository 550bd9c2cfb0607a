//! Storage Server in isolation, no Name Server attached: exercises the
//! NM-facing administrative listener directly (spec §6.1), the way a
//! replication/recovery caller on the NS side would.

use docstore_common::config::SsConfig;
use docstore_ss::state::SsState;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

async fn start_ss() -> (std::sync::Arc<SsState>, u16, u16) {
    let client_listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let client_port = client_listener.local_addr().unwrap().port();
    let nm_listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let nm_port = nm_listener.local_addr().unwrap().port();

    let config = SsConfig {
        ss_id: "ss-admin".to_string(),
        client_port,
        nm_port,
        data_dir: tempfile::tempdir().unwrap().into_path(),
        ..Default::default()
    };
    let state = SsState::new(config);
    tokio::spawn(docstore_ss::client_listener::run_client_listener(state.clone(), client_listener));
    tokio::spawn(docstore_ss::nm_listener::run_nm_listener(state.clone(), nm_listener));
    (state, client_port, nm_port)
}

async fn nm_line(nm_port: u16, line: &str) -> String {
    let stream = TcpStream::connect(("127.0.0.1", nm_port)).await.unwrap();
    let (read_half, mut writer) = tokio::io::split(stream);
    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    writer.flush().await.unwrap();
    let mut reader = BufReader::new(read_half);
    let mut reply = String::new();
    reader.read_line(&mut reply).await.unwrap();
    reply.trim_end_matches(['\n', '\r']).to_string()
}

#[tokio::test]
async fn create_writecontent_read_roundtrip() {
    let (_state, client_port, nm_port) = start_ss().await;

    assert_eq!(nm_line(nm_port, "NM_CREATE memo.txt").await, "ACK_NM_CREATE");

    let content = b"Shipping tomorrow.";
    let stream = TcpStream::connect(("127.0.0.1", nm_port)).await.unwrap();
    let (read_half, mut writer) = tokio::io::split(stream);
    writer
        .write_all(format!("NM_WRITECONTENT memo.txt {}\n", content.len()).as_bytes())
        .await
        .unwrap();
    writer.write_all(content).await.unwrap();
    writer.flush().await.unwrap();
    let mut reader = BufReader::new(read_half);
    let mut reply = String::new();
    reader.read_line(&mut reply).await.unwrap();
    assert_eq!(reply.trim_end(), "ACK_NM_WRITECONTENT");

    let client_stream = TcpStream::connect(("127.0.0.1", client_port)).await.unwrap();
    let (read_half, mut writer) = tokio::io::split(client_stream);
    writer.write_all(b"READ memo.txt\n").await.unwrap();
    writer.flush().await.unwrap();
    let mut buf = Vec::new();
    BufReader::new(read_half).read_to_end(&mut buf).await.unwrap();
    assert_eq!(buf, content);

    let stats = nm_line(nm_port, "NM_GETSTATS memo.txt").await;
    assert!(stats.starts_with("STATS "));
    let size = stats.split_whitespace().nth(1).unwrap();
    assert_eq!(size, content.len().to_string());
}

#[tokio::test]
async fn check_locks_reflects_an_in_progress_write() {
    let (_state, client_port, nm_port) = start_ss().await;
    assert_eq!(nm_line(nm_port, "NM_CREATE ledger.txt").await, "ACK_NM_CREATE");
    assert_eq!(nm_line(nm_port, "NM_CHECK_LOCKS ledger.txt").await, "FILE_UNLOCKED");

    let stream = TcpStream::connect(("127.0.0.1", client_port)).await.unwrap();
    let (read_half, mut writer) = tokio::io::split(stream);
    writer.write_all(b"WRITE ledger.txt 1\n").await.unwrap();
    writer.flush().await.unwrap();
    let mut reader = BufReader::new(read_half);
    let mut reply = String::new();
    reader.read_line(&mut reply).await.unwrap();
    assert_eq!(reply.trim_end(), "ACK_WRITE_LOCKED");

    assert_eq!(nm_line(nm_port, "NM_CHECK_LOCKS ledger.txt").await, "FILE_LOCKED");

    writer.write_all(b"ETIRW\n").await.unwrap();
    writer.flush().await.unwrap();
    reply.clear();
    reader.read_line(&mut reply).await.unwrap();
    assert_eq!(reply.trim_end(), "ACK_WRITE_SUCCESS");

    assert_eq!(nm_line(nm_port, "NM_CHECK_LOCKS ledger.txt").await, "FILE_UNLOCKED");
}

#[tokio::test]
async fn move_then_delete_clear_the_old_path() {
    let (_state, _client_port, nm_port) = start_ss().await;
    assert_eq!(nm_line(nm_port, "NM_CREATE old/draft.txt").await, "ACK_NM_CREATE");
    assert_eq!(nm_line(nm_port, "NM_MOVE old/draft.txt new/draft.txt").await, "ACK_NM_MOVE");
    assert_eq!(nm_line(nm_port, "NM_DELETE new/draft.txt").await, "ACK_NM_DELETE");
    // Deleting again is idempotent (spec §9: SS deletes tolerate a missing file).
    assert_eq!(nm_line(nm_port, "NM_DELETE new/draft.txt").await, "ACK_NM_DELETE");
}
