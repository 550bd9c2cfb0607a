//! `NsConfig`/`SsConfig`, loaded from TOML with defaults seeded from
//! `examples/original_source/common/config.h` and
//! `examples/original_source/name_server/ns_utils.h` (spec §6.2).

use std::path::PathBuf;

use serde::Deserialize;

/// Policy limits and fault-tolerance timing shared by both servers
/// (spec §6.2).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Constants {
    pub buffer_size: usize,
    pub heartbeat_interval_secs: u64,
    pub failure_timeout_secs: u64,
    pub replication_factor: usize,
    pub max_filename: usize,
    pub max_users: usize,
    pub max_ss: usize,
    pub max_clients: usize,
    pub lookup_cache_size: u64,
    pub lookup_cache_ttl_secs: u64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            heartbeat_interval_secs: 5,
            failure_timeout_secs: 15,
            replication_factor: 2,
            max_filename: 256,
            max_users: 50,
            max_ss: 10,
            max_clients: 100,
            lookup_cache_size: 1024,
            lookup_cache_ttl_secs: 30,
        }
    }
}

/// Name Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NsConfig {
    pub command_host: String,
    pub command_port: u16,
    pub heartbeat_host: String,
    pub heartbeat_port: u16,
    pub data_dir: PathBuf,
    pub worker_count: usize,
    pub task_queue_capacity: usize,
    #[serde(flatten)]
    pub constants: Constants,
}

impl Default for NsConfig {
    fn default() -> Self {
        Self {
            command_host: "127.0.0.1".to_string(),
            command_port: 8080,
            heartbeat_host: "127.0.0.1".to_string(),
            heartbeat_port: 8081,
            data_dir: PathBuf::from("persistent/nm_data"),
            worker_count: 8,
            task_queue_capacity: 256,
            constants: Constants::default(),
        }
    }
}

impl NsConfig {
    /// Load from a TOML file, falling back to defaults for any missing
    /// field and for a missing/unreadable file entirely (spec §9: snapshot
    /// and config I/O failures should not be fatal at startup).
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn trie_path(&self) -> PathBuf {
        self.data_dir.join("trie.dat")
    }
}

/// Storage Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SsConfig {
    pub ss_id: String,
    pub client_host: String,
    pub client_port: u16,
    pub nm_host: String,
    pub nm_port: u16,
    pub ns_command_host: String,
    pub ns_command_port: u16,
    pub ns_heartbeat_host: String,
    pub ns_heartbeat_port: u16,
    pub data_dir: PathBuf,
    pub stream_delay_millis: u64,
    #[serde(flatten)]
    pub constants: Constants,
}

impl Default for SsConfig {
    fn default() -> Self {
        Self {
            ss_id: "ss1".to_string(),
            client_host: "127.0.0.1".to_string(),
            client_port: 9001,
            nm_host: "127.0.0.1".to_string(),
            nm_port: 9101,
            ns_command_host: "127.0.0.1".to_string(),
            ns_command_port: 8080,
            ns_heartbeat_host: "127.0.0.1".to_string(),
            ns_heartbeat_port: 8081,
            data_dir: PathBuf::from("persistent/ss_data"),
            stream_delay_millis: 40,
            constants: Constants::default(),
        }
    }
}

impl SsConfig {
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }
}

/// Interactive client configuration: just enough to find the Name Server
/// (spec §6.4: "host/port constants are compile-time or configuration
/// file").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub ns_command_host: String,
    pub ns_command_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { ns_command_host: "127.0.0.1".to_string(), ns_command_port: 8080 }
    }
}

impl ClientConfig {
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }
}
