//! Session — a transient per-connection record (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use shared::jwt::Role;

/// Opaque handle identifying one connection. The Session Registry swaps these
/// atomically on attach; the displaced handle is returned to the caller, who
/// is responsible for closing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionHandle(pub Uuid);

impl ConnectionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub principal_id: Uuid,
    pub role: Role,
    pub handle: ConnectionHandle,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new(principal_id: Uuid, role: Role) -> Self {
        let now = Utc::now();
        Self {
            principal_id,
            role,
            handle: ConnectionHandle::new(),
            connected_at: now,
            last_seen: now,
        }
    }
}
