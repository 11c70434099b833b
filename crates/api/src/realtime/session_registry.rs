//! Session Registry (spec §4.B) — maps principalId to its live connection.
//! `attach` is an atomic swap: a duplicate connection for the same principal
//! displaces the older one by dropping its outbound channel, which ends that
//! connection's event stream.

use dashmap::DashMap;
use domain::models::session::{ConnectionHandle, Role, Session};
use tokio::sync::mpsc;
use uuid::Uuid;

use domain::events::OutboundEvent;

const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

struct Entry {
    session: Session,
    sender: mpsc::Sender<OutboundEvent>,
}

/// Concurrent principal → Session map enforcing single-session-per-principal.
pub struct SessionRegistry {
    entries: DashMap<Uuid, Entry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Registers a new connection for `principal_id`, returning its Session
    /// and the receiver half an SSE handler should stream from. Any prior
    /// connection for this principal is displaced: its sender is dropped,
    /// which closes its stream on the next poll.
    pub fn attach(&self, principal_id: Uuid, role: Role) -> (Session, mpsc::Receiver<OutboundEvent>) {
        let (sender, receiver) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let session = Session::new(principal_id, role);
        self.entries.insert(
            principal_id,
            Entry {
                session: session.clone(),
                sender,
            },
        );
        (session, receiver)
    }

    /// Removes the session if `handle` is still the current one (a later
    /// `attach` may have already displaced it).
    pub fn detach(&self, principal_id: Uuid, handle: ConnectionHandle) {
        self.entries.remove_if(&principal_id, |_, entry| entry.session.handle == handle);
    }

    pub fn lookup(&self, principal_id: Uuid) -> Option<Session> {
        self.entries.get(&principal_id).map(|e| e.session.clone())
    }

    pub fn is_online(&self, principal_id: Uuid) -> bool {
        self.entries.contains_key(&principal_id)
    }

    /// Best-effort delivery; drops the event if the principal is offline or
    /// its channel is full (spec §5: "drops under backpressure are allowed").
    pub fn send_to(&self, principal_id: Uuid, event: OutboundEvent) -> bool {
        match self.entries.get(&principal_id) {
            Some(entry) => entry.sender.try_send(event).is_ok(),
            None => false,
        }
    }

    /// principalIds of captains currently online, for idle-captain notify
    /// fan-out (spec §4.F).
    pub fn online_captains(&self) -> Vec<Uuid> {
        self.entries
            .iter()
            .filter(|e| e.value().session.role == Role::Captain)
            .map(|e| *e.key())
            .collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_then_lookup_finds_session() {
        let registry = SessionRegistry::new();
        let principal = Uuid::new_v4();
        let (session, _rx) = registry.attach(principal, Role::Passenger);
        let found = registry.lookup(principal).unwrap();
        assert_eq!(found.handle, session.handle);
    }

    #[test]
    fn second_attach_displaces_first_channel() {
        let registry = SessionRegistry::new();
        let principal = Uuid::new_v4();
        let (_first_session, mut first_rx) = registry.attach(principal, Role::Captain);
        let (_second_session, _second_rx) = registry.attach(principal, Role::Captain);

        // the first receiver's sender has been dropped from the registry
        assert!(first_rx.try_recv().is_err());
    }

    #[test]
    fn detach_with_stale_handle_is_noop() {
        let registry = SessionRegistry::new();
        let principal = Uuid::new_v4();
        let (first_session, _rx1) = registry.attach(principal, Role::Passenger);
        let (_second_session, _rx2) = registry.attach(principal, Role::Passenger);

        registry.detach(principal, first_session.handle);
        assert!(registry.lookup(principal).is_some());
    }

    #[test]
    fn detach_with_current_handle_removes_session() {
        let registry = SessionRegistry::new();
        let principal = Uuid::new_v4();
        let (session, _rx) = registry.attach(principal, Role::Passenger);
        registry.detach(principal, session.handle);
        assert!(registry.lookup(principal).is_none());
    }

    #[test]
    fn send_to_offline_principal_returns_false() {
        let registry = SessionRegistry::new();
        assert!(!registry.send_to(Uuid::new_v4(), OutboundEvent::RideError { reason: "x".into() }));
    }
}
