//! Undo slot (spec §3, §4.9): single-depth write history per file.

use dashmap::DashMap;

/// Single-depth history: the file's content immediately before the last
/// committed WRITE or REVERT (spec GLOSSARY "Undo slot").
pub struct UndoLog {
    slots: DashMap<String, Vec<u8>>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self { slots: DashMap::new() }
    }

    /// Overwrites any prior undo snapshot for `file` (spec §4.8 step 5).
    pub fn snapshot(&self, file: &str, content: Vec<u8>) {
        self.slots.insert(file.to_string(), content);
    }

    /// Consumes the slot: `UNDO` both reads and clears it (spec §4.9).
    pub fn take(&self, file: &str) -> Option<Vec<u8>> {
        self.slots.remove(file).map(|(_, v)| v)
    }

    pub fn clear(&self, file: &str) {
        self.slots.remove(file);
    }
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_snapshot_is_consumed_once() {
        let log = UndoLog::new();
        log.snapshot("a.txt", b"before".to_vec());
        assert_eq!(log.take("a.txt"), Some(b"before".to_vec()));
        assert_eq!(log.take("a.txt"), None);
    }

    #[test]
    fn later_snapshot_overwrites_earlier_one() {
        let log = UndoLog::new();
        log.snapshot("a.txt", b"v1".to_vec());
        log.snapshot("a.txt", b"v2".to_vec());
        assert_eq!(log.take("a.txt"), Some(b"v2".to_vec()));
    }
}
