//! Checkpoint store (spec §3, §4.9): named immutable full-content
//! snapshots, tag→bytes, per file.

use dashmap::DashMap;

pub struct CheckpointStore {
    checkpoints: DashMap<String, DashMap<String, Vec<u8>>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self { checkpoints: DashMap::new() }
    }

    /// `CHECKPOINT name tag`: re-using a tag overwrites it.
    pub fn save(&self, file: &str, tag: &str, content: Vec<u8>) {
        self.checkpoints.entry(file.to_string()).or_default().insert(tag.to_string(), content);
    }

    pub fn get(&self, file: &str, tag: &str) -> Option<Vec<u8>> {
        self.checkpoints.get(file)?.get(tag).map(|v| v.clone())
    }

    /// Tags for `file`, sorted for a stable `LISTCHECKPOINTS` reply.
    pub fn tags(&self, file: &str) -> Vec<String> {
        let mut tags: Vec<String> = self
            .checkpoints
            .get(file)
            .map(|m| m.iter().map(|e| e.key().clone()).collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    pub fn clear_file(&self, file: &str) {
        self.checkpoints.remove(file);
    }
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_tags_are_per_file_and_overwritable() {
        let store = CheckpointStore::new();
        store.save("a.txt", "v1", b"one".to_vec());
        store.save("a.txt", "v1", b"two".to_vec());
        store.save("a.txt", "v2", b"three".to_vec());
        assert_eq!(store.get("a.txt", "v1"), Some(b"two".to_vec()));
        assert_eq!(store.tags("a.txt"), vec!["v1".to_string(), "v2".to_string()]);
    }

    #[test]
    fn tags_are_scoped_per_file() {
        let store = CheckpointStore::new();
        store.save("a.txt", "v1", b"one".to_vec());
        assert!(store.tags("b.txt").is_empty());
    }
}
