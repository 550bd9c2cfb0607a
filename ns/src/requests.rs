//! Request Queue (spec §3 Access Request): monotonic registry of access
//! requests with a shared ID counter, collapsing duplicate pending
//! requests for the same `(filename, requester, type)`.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use docstore_common::time::now_secs;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Write,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Read => "READ",
            RequestKind::Write => "WRITE",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Denied => "DENIED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub id: u64,
    pub filename: String,
    pub requester: String,
    pub owner: String,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub created_at: i64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request not found")]
    NotFound,
    #[error("request is not pending")]
    NotPending,
    #[error("caller is not the request's owner")]
    NotRequestOwner,
}

pub struct RequestQueue {
    requests: DashMap<u64, AccessRequest>,
    next_id: AtomicU64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self { requests: DashMap::new(), next_id: AtomicU64::new(1) }
    }

    /// REQACCESS (spec §4.4): duplicate pending requests collapse to the
    /// existing id.
    pub fn create(
        &self,
        filename: &str,
        requester: &str,
        owner: &str,
        kind: RequestKind,
    ) -> u64 {
        if let Some(existing) = self.requests.iter().find(|e| {
            e.filename == filename
                && e.requester == requester
                && e.kind == kind
                && e.status == RequestStatus::Pending
        }) {
            return existing.id;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests.insert(
            id,
            AccessRequest {
                id,
                filename: filename.to_string(),
                requester: requester.to_string(),
                owner: owner.to_string(),
                kind,
                status: RequestStatus::Pending,
                created_at: now_secs(),
            },
        );
        id
    }

    pub fn list_for(&self, username: &str) -> Vec<AccessRequest> {
        let mut out: Vec<AccessRequest> = self
            .requests
            .iter()
            .filter(|e| e.requester == username || e.owner == username)
            .map(|e| e.clone())
            .collect();
        out.sort_by_key(|r| r.id);
        out
    }

    fn transition(
        &self,
        id: u64,
        acting_owner: &str,
        new_status: RequestStatus,
    ) -> Result<AccessRequest, RequestError> {
        let mut entry = self.requests.get_mut(&id).ok_or(RequestError::NotFound)?;
        if entry.owner != acting_owner {
            return Err(RequestError::NotRequestOwner);
        }
        if entry.status != RequestStatus::Pending {
            return Err(RequestError::NotPending);
        }
        entry.status = new_status;
        Ok(entry.clone())
    }

    pub fn approve(&self, id: u64, acting_owner: &str) -> Result<AccessRequest, RequestError> {
        self.transition(id, acting_owner, RequestStatus::Approved)
    }

    pub fn deny(&self, id: u64, acting_owner: &str) -> Result<AccessRequest, RequestError> {
        self.transition(id, acting_owner, RequestStatus::Denied)
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_pending_requests_collapse() {
        let q = RequestQueue::new();
        let id1 = q.create("d.txt", "bob", "alice", RequestKind::Write);
        let id2 = q.create("d.txt", "bob", "alice", RequestKind::Write);
        assert_eq!(id1, id2);
    }

    #[test]
    fn approve_requires_pending_and_owner() {
        let q = RequestQueue::new();
        let id = q.create("d.txt", "bob", "alice", RequestKind::Write);
        assert_eq!(q.approve(id, "bob"), Err(RequestError::NotRequestOwner));
        let approved = q.approve(id, "alice").unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(q.approve(id, "alice"), Err(RequestError::NotPending));
    }

    #[test]
    fn new_request_after_denial_is_not_collapsed() {
        let q = RequestQueue::new();
        let id1 = q.create("d.txt", "bob", "alice", RequestKind::Write);
        q.deny(id1, "alice").unwrap();
        let id2 = q.create("d.txt", "bob", "alice", RequestKind::Write);
        assert_ne!(id1, id2);
    }
}
