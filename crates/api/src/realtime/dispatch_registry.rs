//! DispatchProcess bookkeeping (spec §3, §4.E) — a concurrent map keyed by
//! rideId recording that a Dispatcher is currently running for that ride, and
//! exposing its cancel token. Cancellation is idempotent by construction:
//! sending on an already-cancelled `watch::Sender` is a no-op.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

struct Process {
    cancel_tx: watch::Sender<bool>,
    started_at: DateTime<Utc>,
}

/// Tracks in-flight Dispatchers and short per-ride captain cooldowns
/// (captain-cancel re-offer exclusion, spec §4.E).
pub struct DispatchRegistry {
    processes: DashMap<Uuid, Process>,
    cooldowns: DashMap<(Uuid, Uuid), DateTime<Utc>>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self {
            processes: DashMap::new(),
            cooldowns: DashMap::new(),
        }
    }

    /// Registers a new DispatchProcess for `ride_id`, returning its cancel
    /// receiver. Returns `None` if one is already running — callers (the
    /// Sweeper, the requestRide handler) must treat that as "already
    /// handled", never as an error.
    pub fn try_register(&self, ride_id: Uuid) -> Option<watch::Receiver<bool>> {
        use dashmap::mapref::entry::Entry;
        match self.processes.entry(ride_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let (cancel_tx, cancel_rx) = watch::channel(false);
                slot.insert(Process {
                    cancel_tx,
                    started_at: Utc::now(),
                });
                metrics::gauge!("dispatch_active_processes").increment(1.0);
                Some(cancel_rx)
            }
        }
    }

    pub fn is_active(&self, ride_id: Uuid) -> bool {
        self.processes.contains_key(&ride_id)
    }

    /// Signals cancellation; idempotent, fine to call on an already-finished
    /// or already-cancelled process.
    pub fn cancel(&self, ride_id: Uuid) {
        if let Some(process) = self.processes.get(&ride_id) {
            let _ = process.cancel_tx.send(true);
        }
    }

    /// Removes the bookkeeping entry. Dispatchers call this on every exit
    /// path via a scoped finalizer (spec §5).
    pub fn remove(&self, ride_id: Uuid) {
        if self.processes.remove(&ride_id).is_some() {
            metrics::gauge!("dispatch_active_processes").decrement(1.0);
        }
    }

    pub fn started_at(&self, ride_id: Uuid) -> Option<DateTime<Utc>> {
        self.processes.get(&ride_id).map(|p| p.started_at)
    }

    /// All rideIds with a live Dispatcher, for the Sweeper's exclusion list.
    pub fn active_ride_ids(&self) -> Vec<Uuid> {
        self.processes.iter().map(|e| *e.key()).collect()
    }

    /// Excludes `captain_id` from offers on `ride_id` until `cooldown` elapses.
    pub fn set_cooldown(&self, ride_id: Uuid, captain_id: Uuid, cooldown: Duration) {
        let expires_at = Utc::now() + chrono::Duration::from_std(cooldown).unwrap_or_default();
        self.cooldowns.insert((ride_id, captain_id), expires_at);
    }

    pub fn is_on_cooldown(&self, ride_id: Uuid, captain_id: Uuid) -> bool {
        match self.cooldowns.get(&(ride_id, captain_id)) {
            Some(expires_at) => Utc::now() < *expires_at,
            None => false,
        }
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_register_twice_returns_none_second_time() {
        let registry = DispatchRegistry::new();
        let ride_id = Uuid::new_v4();
        assert!(registry.try_register(ride_id).is_some());
        assert!(registry.try_register(ride_id).is_none());
    }

    #[test]
    fn remove_allows_re_registration() {
        let registry = DispatchRegistry::new();
        let ride_id = Uuid::new_v4();
        registry.try_register(ride_id);
        registry.remove(ride_id);
        assert!(registry.try_register(ride_id).is_some());
    }

    #[test]
    fn cancel_is_idempotent_and_observable() {
        let registry = DispatchRegistry::new();
        let ride_id = Uuid::new_v4();
        let mut rx = registry.try_register(ride_id).unwrap();
        registry.cancel(ride_id);
        registry.cancel(ride_id);
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn cooldown_expires() {
        let registry = DispatchRegistry::new();
        let ride_id = Uuid::new_v4();
        let captain_id = Uuid::new_v4();
        registry.set_cooldown(ride_id, captain_id, Duration::from_secs(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!registry.is_on_cooldown(ride_id, captain_id));
    }

    #[test]
    fn cooldown_blocks_within_window() {
        let registry = DispatchRegistry::new();
        let ride_id = Uuid::new_v4();
        let captain_id = Uuid::new_v4();
        registry.set_cooldown(ride_id, captain_id, Duration::from_secs(60));
        assert!(registry.is_on_cooldown(ride_id, captain_id));
    }
}
