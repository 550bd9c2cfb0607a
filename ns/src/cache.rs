//! Lookup Cache (spec §4.2): filename → SS-ID with a TTL, in front of the
//! trie. Implemented with `moka::sync::Cache`, the idiomatic-Rust stand-in
//! for the source's fixed hash table with TTL eviction and explicit
//! invalidation (spec §9 permits substituting the data structure as long as
//! hit/invalidate semantics match).

use std::time::Duration;

use moka::sync::Cache;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub ss_id: String,
}

pub struct LookupCache {
    inner: Cache<String, CacheEntry>,
}

impl LookupCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder().max_capacity(max_capacity).time_to_live(ttl).build();
        Self { inner }
    }

    /// A hit only returns the cached SS id; the caller is still responsible
    /// for re-checking permission against the authoritative trie and for
    /// invalidating the entry if the cached SS turns out to be inactive
    /// (spec §4.2).
    pub fn get(&self, filename: &str) -> Option<String> {
        self.inner.get(filename).map(|e| e.ss_id)
    }

    pub fn put(&self, filename: &str, ss_id: &str) {
        self.inner.insert(filename.to_string(), CacheEntry { ss_id: ss_id.to_string() });
    }

    /// Invalidated on CREATE/DELETE/MOVE/RESTORE/TRASH against `filename`.
    pub fn invalidate(&self, filename: &str) {
        self.inner.invalidate(filename);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_invalidate() {
        let cache = LookupCache::new(16, Duration::from_secs(30));
        cache.put("a.txt", "ss1");
        assert_eq!(cache.get("a.txt"), Some("ss1".to_string()));
        cache.invalidate("a.txt");
        assert_eq!(cache.get("a.txt"), None);
    }
}
