//! The per-request session snapshot.

use std::collections::HashMap;

use serde_json::Value;
use time::OffsetDateTime;

use crate::SessionId;

/// Application keys starting with this prefix are rejected: the namespace
/// is reserved for session metadata.
pub const RESERVED_KEY_PREFIX: &str = "_";

/// Reserved keys carried inside the persisted payload.
pub mod keys {
    /// Serialized creation instant.
    pub const CREATED_AT: &str = "_created_at";
    /// Serialized last-activity instant.
    pub const LAST_ACTIVITY_AT: &str = "_last_activity_at";
    /// SHA-256 hex digest of the outstanding CSRF token.
    pub const CSRF_TOKEN: &str = "_csrf_token";
    /// Bound `User-Agent` string.
    pub const USER_AGENT: &str = "_user_agent";
    /// Salted SHA-256 hex digest of the bound client IP.
    pub const IP_HASH: &str = "_ip_hash";
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Live session, id unchanged since `start`.
    Active,
    /// The id was rotated during this request.
    Regenerated,
    /// The session was destroyed during this request. Terminal for this
    /// engine instance.
    Destroyed,
}

/// An immutable snapshot of a session.
///
/// Every mutation consumes the snapshot and produces a new one; the engine
/// holds exactly one current snapshot per request. The `dirty` flag is true
/// iff the state has mutated since the last successful store write.
#[derive(Debug, Clone)]
pub struct SessionState {
    id: SessionId,
    data: HashMap<String, Value>,
    created_at: OffsetDateTime,
    last_activity_at: OffsetDateTime,
    status: SessionStatus,
    dirty: bool,
}

impl SessionState {
    /// A brand-new session: fresh id, empty data, both timestamps at `now`.
    pub(crate) fn fresh(now: OffsetDateTime) -> Self {
        Self {
            id: SessionId::generate(),
            data: HashMap::new(),
            created_at: now,
            last_activity_at: now,
            status: SessionStatus::Active,
            dirty: false,
        }
    }

    /// A session reconstituted from a stored payload. `last_activity_at`
    /// advances to `now`; that alone does not dirty the state.
    pub(crate) fn resumed(
        id: SessionId,
        data: HashMap<String, Value>,
        created_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            data,
            created_at,
            last_activity_at: now,
            status: SessionStatus::Active,
            dirty: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn last_activity_at(&self) -> OffsetDateTime {
        self.last_activity_at
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    pub(crate) fn inserting(mut self, key: String, value: Value) -> Self {
        self.data.insert(key, value);
        self.dirty = true;
        self
    }

    /// Removes `key`; the state is only dirtied if the key existed.
    pub(crate) fn removing(mut self, key: &str) -> (Self, Option<Value>) {
        let previous = self.data.remove(key);
        if previous.is_some() {
            self.dirty = true;
        }
        (self, previous)
    }

    pub(crate) fn cleared(mut self) -> Self {
        self.data.clear();
        self.dirty = true;
        self
    }

    /// Rotates the id, keeping the data. Status becomes `Regenerated`.
    pub(crate) fn rotated(mut self, new_id: SessionId) -> Self {
        self.id = new_id;
        self.status = SessionStatus::Regenerated;
        self.dirty = true;
        self
    }

    /// Terminal transition: data wiped, status `Destroyed`.
    pub(crate) fn destroyed(mut self) -> Self {
        self.data.clear();
        self.status = SessionStatus::Destroyed;
        self.dirty = true;
        self
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
