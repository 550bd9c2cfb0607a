//! Session Table (spec §3 Session): active and historical client sessions
//! keyed by username. A duplicate *live* username is rejected; an inactive
//! slot can be reconnected into.

use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub is_active: bool,
}

pub struct SessionTable {
    sessions: DashMap<String, Session>,
    max_clients: usize,
}

/// `REG_CLIENT <username>` outcome (spec §6.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    UsernameInUse,
    MaxClients,
}

impl SessionTable {
    pub fn new(max_clients: usize) -> Self {
        Self { sessions: DashMap::new(), max_clients }
    }

    pub fn register(&self, username: &str) -> RegisterOutcome {
        if let Some(mut existing) = self.sessions.get_mut(username) {
            if existing.is_active {
                return RegisterOutcome::UsernameInUse;
            }
            existing.is_active = true;
            return RegisterOutcome::Registered;
        }
        if self.sessions.len() >= self.max_clients {
            return RegisterOutcome::MaxClients;
        }
        self.sessions.insert(
            username.to_string(),
            Session { username: username.to_string(), is_active: true },
        );
        RegisterOutcome::Registered
    }

    pub fn disconnect(&self, username: &str) {
        if let Some(mut s) = self.sessions.get_mut(username) {
            s.is_active = false;
        }
    }

    pub fn list(&self) -> Vec<Session> {
        let mut out: Vec<Session> = self.sessions.iter().map(|e| e.clone()).collect();
        out.sort_by(|a, b| a.username.cmp(&b.username));
        out
    }

    pub fn active_usernames(&self) -> Vec<String> {
        self.sessions.iter().filter(|e| e.is_active).map(|e| e.username.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_live_username_is_rejected() {
        let table = SessionTable::new(10);
        assert_eq!(table.register("alice"), RegisterOutcome::Registered);
        assert_eq!(table.register("alice"), RegisterOutcome::UsernameInUse);
    }

    #[test]
    fn inactive_slot_can_reconnect() {
        let table = SessionTable::new(10);
        table.register("alice");
        table.disconnect("alice");
        assert_eq!(table.register("alice"), RegisterOutcome::Registered);
    }

    #[test]
    fn full_table_rejects_new_username() {
        let table = SessionTable::new(1);
        table.register("alice");
        assert_eq!(table.register("bob"), RegisterOutcome::MaxClients);
    }
}
