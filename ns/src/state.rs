//! Shared Name Server state. Every connection task and background loop
//! holds an `Arc<NsState>`; nothing here is mutated through `&mut self`.
//!
//! Canonical lock order, always acquired outer-to-inner to avoid deadlock
//! when a single command touches more than one structure (e.g. CREATE
//! touches the directory, then the registry, then the cache):
//!
//!   directory -> registry -> cache -> sessions -> requests
//!
//! No code path should need to hold two of these locks across an `.await`
//! point; each structure's own methods lock-copy-unlock internally.

use std::sync::Arc;
use std::time::Duration;

use docstore_common::config::NsConfig;
use tokio::sync::broadcast;

use crate::cache::LookupCache;
use crate::registry::SsRegistry;
use crate::requests::RequestQueue;
use crate::session::SessionTable;
use crate::ss_link::{SsLink, TcpSsLink};
use crate::trie::Directory;

pub struct NsState {
    pub config: NsConfig,
    pub directory: Directory,
    pub registry: SsRegistry,
    pub cache: LookupCache,
    pub sessions: SessionTable,
    pub requests: RequestQueue,
    pub ss_link: Arc<dyn SsLink>,
    /// Broadcast to every connected client/SS task on shutdown; receivers
    /// `select!` against this alongside their next read.
    pub shutdown: broadcast::Sender<()>,
}

impl NsState {
    pub fn new(config: NsConfig) -> Arc<Self> {
        let directory = Directory::load(config.trie_path());
        let registry = SsRegistry::new(config.constants.max_ss);
        let cache = LookupCache::new(
            config.constants.lookup_cache_size as u64,
            Duration::from_secs(config.constants.lookup_cache_ttl_secs),
        );
        let sessions = SessionTable::new(config.constants.max_clients);
        let requests = RequestQueue::new();
        let (shutdown, _) = broadcast::channel(1);
        Arc::new(Self {
            config,
            directory,
            registry,
            cache,
            sessions,
            requests,
            ss_link: Arc::new(TcpSsLink),
            shutdown,
        })
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}
