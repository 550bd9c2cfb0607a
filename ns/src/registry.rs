//! SS Registry (spec §2/§4.5/§4.6): known storage servers, their liveness,
//! and the round-robin replica-selection counter (spec §4.4: "stateful
//! across calls").

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use docstore_common::time::now_secs;

#[derive(Debug, Clone)]
pub struct SsInfo {
    pub id: String,
    pub ip: String,
    pub client_port: u16,
    pub nm_port: u16,
    pub is_active: bool,
    pub last_heartbeat: i64,
}

/// Outcome of a `REG_SS` command (spec §6.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    New,
    Recovery,
}

pub struct SsRegistry {
    servers: DashMap<String, SsInfo>,
    rr_counter: AtomicUsize,
    max_ss: usize,
}

impl SsRegistry {
    pub fn new(max_ss: usize) -> Self {
        Self { servers: DashMap::new(), rr_counter: AtomicUsize::new(0), max_ss }
    }

    /// `REG_SS <ss_id> <client_port> <nm_port>` (spec §6.1). Returns `None`
    /// if the registry is full and `ss_id` is new.
    pub fn register(
        &self,
        ss_id: &str,
        ip: &str,
        client_port: u16,
        nm_port: u16,
    ) -> Option<RegisterOutcome> {
        if !self.servers.contains_key(ss_id) && self.servers.len() >= self.max_ss {
            return None;
        }
        let outcome = if self.servers.contains_key(ss_id) {
            RegisterOutcome::Recovery
        } else {
            RegisterOutcome::New
        };
        self.servers.insert(
            ss_id.to_string(),
            SsInfo {
                id: ss_id.to_string(),
                ip: ip.to_string(),
                client_port,
                nm_port,
                is_active: true,
                last_heartbeat: now_secs(),
            },
        );
        Some(outcome)
    }

    /// `HEARTBEAT <ss_id>` (spec §4.5). Returns `true` if the SS transitioned
    /// from inactive back to active (an "online again" event).
    pub fn heartbeat(&self, ss_id: &str) -> bool {
        if let Some(mut info) = self.servers.get_mut(ss_id) {
            info.last_heartbeat = now_secs();
            let was_inactive = !info.is_active;
            info.is_active = true;
            was_inactive
        } else {
            false
        }
    }

    /// Sweeps for SS whose last heartbeat is older than `failure_timeout`
    /// and flips them inactive, returning the ids that changed state.
    pub fn sweep_failures(&self, failure_timeout_secs: i64) -> Vec<String> {
        let now = now_secs();
        let mut newly_failed = Vec::new();
        for mut entry in self.servers.iter_mut() {
            if entry.is_active && now - entry.last_heartbeat > failure_timeout_secs {
                entry.is_active = false;
                newly_failed.push(entry.id.clone());
            }
        }
        newly_failed
    }

    pub fn get(&self, ss_id: &str) -> Option<SsInfo> {
        self.servers.get(ss_id).map(|e| e.clone())
    }

    pub fn is_active(&self, ss_id: &str) -> bool {
        self.servers.get(ss_id).map(|e| e.is_active).unwrap_or(false)
    }

    pub fn mark_inactive(&self, ss_id: &str) {
        if let Some(mut e) = self.servers.get_mut(ss_id) {
            e.is_active = false;
        }
    }

    /// Active SS ids, sorted for a deterministic round-robin order.
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> =
            self.servers.iter().filter(|e| e.is_active).map(|e| e.id.clone()).collect();
        ids.sort();
        ids
    }

    pub fn all_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.servers.iter().map(|e| e.id.clone()).collect();
        ids.sort();
        ids
    }

    /// Chooses a primary via a shared round-robin counter and up to
    /// `replication_factor - 1` further active SS as replicas (spec §4.4).
    /// Degrades silently to fewer replicas if too few active SS exist
    /// (spec §9 Open Question).
    pub fn select_replicas(&self, replication_factor: usize) -> Option<Vec<String>> {
        let active = self.active_ids();
        if active.is_empty() {
            return None;
        }
        let idx = self.rr_counter.fetch_add(1, Ordering::Relaxed) % active.len();
        let mut chosen = vec![active[idx].clone()];
        let mut i = 1;
        while chosen.len() < replication_factor && i < active.len() {
            chosen.push(active[(idx + i) % active.len()].clone());
            i += 1;
        }
        Some(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_recover() {
        let reg = SsRegistry::new(10);
        assert_eq!(reg.register("ss1", "127.0.0.1", 1, 2), Some(RegisterOutcome::New));
        assert_eq!(reg.register("ss1", "127.0.0.1", 1, 2), Some(RegisterOutcome::Recovery));
    }

    #[test]
    fn heartbeat_revives_inactive_server() {
        let reg = SsRegistry::new(10);
        reg.register("ss1", "127.0.0.1", 1, 2);
        reg.mark_inactive("ss1");
        assert!(!reg.is_active("ss1"));
        assert!(reg.heartbeat("ss1"));
        assert!(reg.is_active("ss1"));
    }

    #[test]
    fn sweep_flags_only_stale_servers() {
        let reg = SsRegistry::new(10);
        reg.register("ss1", "127.0.0.1", 1, 2);
        let failed = reg.sweep_failures(-1);
        assert_eq!(failed, vec!["ss1".to_string()]);
        assert!(!reg.is_active("ss1"));
    }

    #[test]
    fn round_robin_is_stateful_across_calls() {
        let reg = SsRegistry::new(10);
        reg.register("ss1", "h", 1, 2);
        reg.register("ss2", "h", 1, 2);
        let first = reg.select_replicas(1).unwrap();
        let second = reg.select_replicas(1).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn select_replicas_degrades_with_few_active_servers() {
        let reg = SsRegistry::new(10);
        reg.register("ss1", "h", 1, 2);
        let chosen = reg.select_replicas(2).unwrap();
        assert_eq!(chosen.len(), 1);
    }

    #[test]
    fn registry_full_rejects_new_server() {
        let reg = SsRegistry::new(1);
        assert!(reg.register("ss1", "h", 1, 2).is_some());
        assert!(reg.register("ss2", "h", 1, 2).is_none());
    }
}
