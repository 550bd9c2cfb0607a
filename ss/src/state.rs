//! Shared Storage Server state: the file store plus its three ancillary
//! per-file stores (spec §3 "SS File"), bundled behind one value threaded
//! through both listeners (spec §9 "replace globals with a `ServerState`
//! value").

use std::sync::Arc;

use dashmap::DashMap;
use docstore_common::config::SsConfig;
use docstore_common::time::now_secs;
use tokio::sync::broadcast;

use crate::checkpoints::CheckpointStore;
use crate::locks::LockTable;
use crate::store::FileStore;
use crate::undo::UndoLog;

pub struct SsState {
    pub config: SsConfig,
    pub store: FileStore,
    pub locks: LockTable,
    pub undo: UndoLog,
    pub checkpoints: CheckpointStore,
    access_times: DashMap<String, i64>,
    pub shutdown: broadcast::Sender<()>,
}

impl SsState {
    pub fn new(config: SsConfig) -> Arc<Self> {
        let store = FileStore::new(config.data_dir.clone());
        let (shutdown, _) = broadcast::channel(1);
        Arc::new(Self {
            config,
            store,
            locks: LockTable::new(),
            undo: UndoLog::new(),
            checkpoints: CheckpointStore::new(),
            access_times: DashMap::new(),
            shutdown,
        })
    }

    pub fn touch(&self, name: &str) {
        self.access_times.insert(name.to_string(), now_secs());
    }

    pub fn last_access(&self, name: &str) -> i64 {
        self.access_times.get(name).map(|t| *t).unwrap_or_else(now_secs)
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}
