//! SS Lock Table (spec §3, §4.8): a per-file set of currently write-locked
//! sentence indices. `NM_CHECK_LOCKS` (spec §4.8 "Lock-table visibility to
//! NS") reports a file as locked iff its set is non-empty.

use std::collections::HashSet;

use dashmap::DashMap;

pub struct LockTable {
    locked: DashMap<String, HashSet<usize>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self { locked: DashMap::new() }
    }

    /// Attempts to lock `sentence` in `file`; `false` if already locked
    /// (spec §4.8 step 2).
    pub fn try_lock(&self, file: &str, sentence: usize) -> bool {
        let mut set = self.locked.entry(file.to_string()).or_default();
        set.insert(sentence)
    }

    /// Releases the lock, whether committed via `ETIRW` or dropped mid-edit
    /// (spec §4.8 step 6, §5 "releases any sentence lock the SS holds for
    /// that client").
    pub fn unlock(&self, file: &str, sentence: usize) {
        if let Some(mut set) = self.locked.get_mut(file) {
            set.remove(&sentence);
        }
    }

    /// `true` iff the file has any active sentence lock (`NM_CHECK_LOCKS`).
    pub fn is_locked(&self, file: &str) -> bool {
        self.locked.get(file).map(|set| !set.is_empty()).unwrap_or(false)
    }

    /// Drops every lock held on `file` (`NM_DELETE`: the bytes are gone,
    /// any in-flight edit session on them is moot).
    pub fn unlock_all(&self, file: &str) {
        self.locked.remove(file);
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_sentence_fails() {
        let table = LockTable::new();
        assert!(table.try_lock("a.txt", 1));
        assert!(!table.try_lock("a.txt", 1));
    }

    #[test]
    fn different_sentences_lock_independently() {
        let table = LockTable::new();
        assert!(table.try_lock("a.txt", 1));
        assert!(table.try_lock("a.txt", 2));
    }

    #[test]
    fn unlock_releases_the_slot() {
        let table = LockTable::new();
        table.try_lock("a.txt", 1);
        table.unlock("a.txt", 1);
        assert!(table.try_lock("a.txt", 1));
    }

    #[test]
    fn is_locked_reflects_any_active_lock() {
        let table = LockTable::new();
        assert!(!table.is_locked("a.txt"));
        table.try_lock("a.txt", 3);
        assert!(table.is_locked("a.txt"));
        table.unlock("a.txt", 3);
        assert!(!table.is_locked("a.txt"));
    }
}
